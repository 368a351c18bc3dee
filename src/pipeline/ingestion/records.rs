use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::config::FieldsConfig;
use crate::error::{EtlError, Result};
use crate::pipeline::table::Cell;

/// One (record ID, attribute) pair from the supplier feed, together with the
/// flat fields that travel on every line of that record.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRow {
    pub id: i64,
    pub attribute_name: Option<String>,
    pub attribute_value: Option<Cell>,
    /// Remaining fields in file order
    pub fields: Vec<(String, Option<Cell>)>,
}

/// Read a newline-delimited JSON feed into long-format attribute rows.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_records(path: &Path, field_names: &FieldsConfig) -> Result<Vec<AttributeRow>> {
    if !path.exists() {
        return Err(EtlError::InputNotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);

    let mut rows = Vec::new();
    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let bytes = bytes?;
        let line = std::str::from_utf8(&bytes).map_err(|e| EtlError::MalformedRecord {
            line: idx + 1,
            reason: format!("invalid UTF-8: {}", e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(parse_line(line, idx + 1, field_names)?);
    }

    info!(records = rows.len(), "Loaded attribute rows");
    crate::observability::metrics::loader::records_loaded(rows.len());
    Ok(rows)
}

/// Parse one feed line. `line_no` is 1-based and only used for error reporting.
pub fn parse_line(line: &str, line_no: usize, fields: &FieldsConfig) -> Result<AttributeRow> {
    let malformed = |reason: String| EtlError::MalformedRecord {
        line: line_no,
        reason,
    };

    let value: Value = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(malformed("expected a JSON object".to_string()));
    };

    let id = parse_id(&object, &fields.id).map_err(malformed)?;

    let attribute_name = match object.get(&fields.attribute_name) {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(other) => {
            return Err(malformed(format!(
                "'{}' must be a string, found {}",
                fields.attribute_name, other
            )))
        }
    };
    let attribute_value = object.get(&fields.attribute_value).and_then(Cell::from_json);

    let flat = object
        .iter()
        .filter(|(key, _)| {
            *key != &fields.id && *key != &fields.attribute_name && *key != &fields.attribute_value
        })
        .map(|(key, value)| (key.clone(), Cell::from_json(value)))
        .collect();

    debug!(id, attribute = ?attribute_name, "Parsed attribute row");
    Ok(AttributeRow {
        id,
        attribute_name,
        attribute_value,
        fields: flat,
    })
}

fn parse_id(object: &Map<String, Value>, id_field: &str) -> std::result::Result<i64, String> {
    let raw = object
        .get(id_field)
        .ok_or_else(|| format!("missing '{}' field", id_field))?;
    Cell::from_json(raw)
        .and_then(|cell| match cell {
            Cell::Bool(_) => None,
            other => other.to_i64(),
        })
        .ok_or_else(|| format!("'{}' is not an integer: {}", id_field, raw))
}
