use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use listing_etl::app::EtlUseCase;
use listing_etl::config::{Config, GeoFailurePolicy};
use listing_etl::constants;
use listing_etl::logging;
use listing_etl::observability::metrics;

#[derive(Parser)]
#[command(name = "listing_etl")]
#[command(about = "Transform a supplier vehicle feed into the target listing schema")]
#[command(version = "0.1.0")]
struct Cli {
    /// Supplier feed, one JSON record per line
    #[arg(long)]
    input: Option<PathBuf>,

    /// Workbook whose first header row defines the target columns
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Destination workbook
    #[arg(long)]
    output: Option<PathBuf>,

    /// Configuration file (falls back to LISTING_ETL_CONFIG, then config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// How to handle cities that cannot be resolved
    #[arg(long, value_enum)]
    geo_failure: Option<GeoFailurePolicy>,

    /// Write a Prometheus text snapshot of run metrics to this file
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(|| std::env::var(constants::CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_CONFIG_PATH))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&config_path(&cli))?;
    if let Some(input) = &cli.input {
        config.paths.input = input.clone();
    }
    if let Some(schema) = &cli.schema {
        config.paths.schema = schema.clone();
    }
    if let Some(output) = &cli.output {
        config.paths.output = output.clone();
    }
    if let Some(policy) = cli.geo_failure {
        config.geo.on_failure = policy;
    }

    let metrics_handle = match &cli.metrics_file {
        Some(_) => Some(metrics::install().map_err(anyhow::Error::msg)?),
        None => None,
    };

    let use_case = EtlUseCase::from_config(&config)?;
    info!(
        input = %config.paths.input.display(),
        schema = %config.paths.schema.display(),
        "Starting listing ETL run"
    );

    match use_case.run(&config.paths.input, &config.paths.schema).await {
        Ok(path) => {
            println!("Output file saved at: {}", path.display());
        }
        Err(e) => {
            error!("ETL run failed: {}", e);
            return Err(e.into());
        }
    }

    if let (Some(handle), Some(path)) = (&metrics_handle, &cli.metrics_file) {
        metrics::write_snapshot(handle, path)?;
    }

    Ok(())
}
