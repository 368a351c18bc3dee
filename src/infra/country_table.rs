use crate::app::ports::{CountryInfo, CountryMetadataPort};
use crate::error::{EtlError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

const BUNDLED_COUNTRIES: &str = include_str!("../../data/countries.toml");

#[derive(Debug, Deserialize)]
struct CountryFile {
    #[serde(default)]
    country: Vec<CountryEntry>,
}

#[derive(Debug, Deserialize)]
struct CountryEntry {
    name: String,
    #[serde(default)]
    alt_names: Vec<String>,
    alpha2: String,
    alpha3: String,
    #[serde(default)]
    currencies: Vec<String>,
}

/// In-memory country reference table, matched case-insensitively on the
/// English name or any alternate spelling.
pub struct CountryTable {
    by_name: HashMap<String, CountryInfo>,
}

impl CountryTable {
    pub fn bundled() -> Result<Self> {
        Self::from_toml_str(BUNDLED_COUNTRIES)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EtlError::InputNotFound(path.to_path_buf()));
        }
        let table = Self::from_toml_str(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), "Loaded country reference table");
        Ok(table)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CountryFile = toml::from_str(content)?;
        let mut by_name = HashMap::new();
        for entry in file.country {
            let info = CountryInfo {
                alpha2: entry.alpha2,
                alpha3: entry.alpha3,
                currencies: entry.currencies,
            };
            for name in std::iter::once(&entry.name).chain(entry.alt_names.iter()) {
                by_name.insert(name_key(name), info.clone());
            }
        }
        Ok(Self { by_name })
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl CountryMetadataPort for CountryTable {
    fn lookup(&self, country_name: &str) -> std::result::Result<CountryInfo, String> {
        self.by_name
            .get(&name_key(country_name))
            .cloned()
            .ok_or_else(|| format!("no country metadata for '{}'", country_name))
    }
}
