use async_trait::async_trait;
use std::path::PathBuf;

use crate::pipeline::table::Table;

/// Free-text geocoding: city name in, location description out
/// (e.g. `"Zürich, Bezirk Zürich, Zürich, Schweiz/Suisse/Svizzera/Svizra"`).
#[async_trait]
pub trait GeocoderPort: Send + Sync {
    async fn resolve(&self, city: &str) -> Result<String, String>;
}

/// Country reference data keyed by (any spelling of) the country name.
pub trait CountryMetadataPort: Send + Sync {
    fn lookup(&self, country_name: &str) -> Result<CountryInfo, String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountryInfo {
    pub alpha2: String,
    pub alpha3: String,
    pub currencies: Vec<String>,
}

/// One named sheet of the stage workbook.
#[derive(Clone, Copy, Debug)]
pub struct StageSheet<'a> {
    pub name: &'a str,
    pub table: &'a Table,
}

/// Writes the stage tables and reports where they ended up.
pub trait ExportPort: Send + Sync {
    fn export(&self, sheets: &[StageSheet<'_>]) -> Result<PathBuf, String>;
}
