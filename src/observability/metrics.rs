//! Metrics for the listing pipeline
//!
//! Stage functions record through the `metrics` facade. Nothing is collected
//! unless a recorder is installed with [`install`], which the binary does
//! when asked to write a metrics file.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Enum representing all metric names used in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RecordsLoaded,
    WideRows,
    GeoLookups,
    UnmappedValues,
    SynthesizedColumns,
    ExportedRows,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RecordsLoaded => "listing_etl_records_loaded_total",
            MetricName::WideRows => "listing_etl_wide_rows",
            MetricName::GeoLookups => "listing_etl_geo_lookups_total",
            MetricName::UnmappedValues => "listing_etl_unmapped_values_total",
            MetricName::SynthesizedColumns => "listing_etl_synthesized_columns",
            MetricName::ExportedRows => "listing_etl_exported_rows",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder and return the handle used for rendering.
pub fn install() -> Result<PrometheusHandle, String> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

/// Write the current metric values in Prometheus text format.
pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, handle.render())?;
    info!(path = %path.display(), "Wrote metrics snapshot");
    Ok(())
}

pub mod loader {
    use super::MetricName;

    pub fn records_loaded(count: usize) {
        metrics::counter!(MetricName::RecordsLoaded.as_str()).increment(count as u64);
    }
}

pub mod reshape {
    use super::MetricName;

    pub fn wide_rows(count: usize) {
        metrics::gauge!(MetricName::WideRows.as_str()).set(count as f64);
    }
}

pub mod geo {
    use super::MetricName;

    pub fn lookup(outcome: &'static str) {
        metrics::counter!(MetricName::GeoLookups.as_str(), "outcome" => outcome).increment(1);
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn unmapped_values(count: usize) {
        metrics::counter!(MetricName::UnmappedValues.as_str()).increment(count as u64);
    }
}

pub mod integrate {
    use super::MetricName;

    pub fn synthesized_columns(count: usize) {
        metrics::gauge!(MetricName::SynthesizedColumns.as_str()).set(count as f64);
    }
}

pub mod export {
    use super::MetricName;

    pub fn completed(rows: usize) {
        metrics::gauge!(MetricName::ExportedRows.as_str()).set(rows as f64);
    }
}
