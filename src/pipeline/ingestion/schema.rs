use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::error::{EtlError, Result};

/// Ordered set of column names the integrated output must carry.
/// Always holds at least one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSchema {
    columns: Vec<String>,
}

impl TargetSchema {
    /// Build a schema from header names. Blank names are skipped and repeats
    /// keep their first position.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for column in columns {
            let column = column.into().trim().to_string();
            if column.is_empty() {
                continue;
            }
            if seen.insert(column.clone()) {
                ordered.push(column);
            } else {
                warn!(column = %column, "Duplicate target schema column ignored");
            }
        }
        if ordered.is_empty() {
            return Err(EtlError::SchemaMismatch(
                "target schema defines no columns".to_string(),
            ));
        }
        Ok(Self { columns: ordered })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Read the header row of the first worksheet (xlsx, xls, xlsb or ods).
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_target_schema(path: &Path) -> Result<TargetSchema> {
    if !path.exists() {
        return Err(EtlError::InputNotFound(path.to_path_buf()));
    }

    let mut workbook = open_workbook_auto(path).map_err(|e| {
        EtlError::SchemaMismatch(format!("cannot open {}: {}", path.display(), e))
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EtlError::SchemaMismatch(format!("{} has no worksheet", path.display())))?
        .map_err(|e| EtlError::SchemaMismatch(format!("cannot read {}: {}", path.display(), e)))?;

    let header: Vec<String> = range
        .rows()
        .next()
        .map(|row| row.iter().filter_map(header_name).collect())
        .unwrap_or_default();

    let schema = TargetSchema::new(header)?;
    info!(columns = schema.len(), "Loaded target schema");
    Ok(schema)
}

fn header_name(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn write_header(path: &Path, header: &[&str]) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in header.iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        sheet.write_string(1, 0, "sample value").unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_schema_deduplicates_and_keeps_order() {
        let schema = TargetSchema::new(["make", "model", " ", "make", "city"]).unwrap();
        assert_eq!(schema.columns(), &["make", "model", "city"]);
        assert!(schema.contains("city"));
    }

    #[test]
    fn test_empty_schema_is_rejected() {
        let result = TargetSchema::new(Vec::<String>::new());
        assert!(matches!(result, Err(EtlError::SchemaMismatch(_))));
    }

    #[test]
    fn test_load_header_row_from_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.xlsx");
        write_header(&path, &["carType", "color", "price_on_request"]);

        let schema = load_target_schema(&path).unwrap();
        assert_eq!(schema.columns(), &["carType", "color", "price_on_request"]);
    }

    #[test]
    fn test_workbook_without_header_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        workbook.save(&path).unwrap();

        let result = load_target_schema(&path);
        assert!(matches!(result, Err(EtlError::SchemaMismatch(_))));
    }

    #[test]
    fn test_unreadable_workbook_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let result = load_target_schema(&path);
        assert!(matches!(result, Err(EtlError::SchemaMismatch(_))));
    }
}
