use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Cannot coerce column '{column}' for record {record}: {value}")]
    TypeCoercion {
        column: String,
        record: String,
        value: String,
    },

    #[error("Geo resolution failed for city '{city}': {reason}")]
    GeoResolution { city: String, reason: String },

    #[error("Target schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
