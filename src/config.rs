use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants;
use crate::error::{EtlError, Result};
use crate::pipeline::processing::integrate::IntegrationRules;
use crate::pipeline::processing::normalize::NormalizationDictionaries;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub fields: FieldsConfig,
    pub geo: GeoConfig,
    pub normalization: NormalizationDictionaries,
    pub integration: IntegrationRules,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input: PathBuf,
    pub schema: PathBuf,
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(constants::DEFAULT_INPUT_PATH),
            schema: PathBuf::from(constants::DEFAULT_SCHEMA_PATH),
            output: PathBuf::from(constants::DEFAULT_OUTPUT_PATH),
        }
    }
}

/// Supplier feed field names that drive reshaping.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    pub id: String,
    pub attribute_name: String,
    pub attribute_value: String,
    pub kilometer: String,
    pub mile: String,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            id: constants::ID_FIELD.to_string(),
            attribute_name: constants::ATTRIBUTE_NAME_FIELD.to_string(),
            attribute_value: constants::ATTRIBUTE_VALUE_FIELD.to_string(),
            kilometer: constants::KILOMETER_FIELD.to_string(),
            mile: constants::MILE_FIELD.to_string(),
        }
    }
}

/// What to do when a city cannot be resolved to country metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeoFailurePolicy {
    /// Abort the run with a geo resolution error
    #[default]
    Fail,
    /// Leave country, zip and currency empty for that city
    Null,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Additional attempts after the first failed geocode call
    pub retries: u32,
    pub max_concurrent_lookups: usize,
    /// Position in the country's currency list used as the listing currency
    pub currency_index: usize,
    pub on_failure: GeoFailurePolicy,
    /// Replaces the bundled country reference table when set
    pub countries_file: Option<PathBuf>,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            endpoint: constants::DEFAULT_GEOCODER_ENDPOINT.to_string(),
            user_agent: constants::DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            retries: 2,
            max_concurrent_lookups: 1,
            currency_index: 1,
            on_failure: GeoFailurePolicy::Fail,
            countries_file: None,
        }
    }
}

impl GeoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.geo.max_concurrent_lookups == 0 {
            return Err(EtlError::Config(
                "geo.max_concurrent_lookups must be at least 1".to_string(),
            ));
        }
        if self.geo.timeout_secs == 0 {
            return Err(EtlError::Config(
                "geo.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
