use crate::app::ports::{ExportPort, StageSheet};
use crate::pipeline::table::{Cell, Table};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use tracing::info;

/// File-based implementation of ExportPort.
/// Writes every stage table as one worksheet of a single xlsx workbook.
pub struct XlsxExporter {
    path: PathBuf,
}

impl XlsxExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_table(sheet: &mut Worksheet, table: &Table, header: &Format) -> Result<(), XlsxError> {
    for (col, name) in table.columns().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, header)?;
    }
    for (idx, row) in table.rows().iter().enumerate() {
        let excel_row = idx as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                None => {}
                Some(Cell::Text(text)) => {
                    sheet.write_string(excel_row, col, text)?;
                }
                Some(Cell::Int(value)) => {
                    sheet.write_number(excel_row, col, *value as f64)?;
                }
                Some(Cell::Float(value)) => {
                    sheet.write_number(excel_row, col, *value)?;
                }
                Some(Cell::Bool(value)) => {
                    sheet.write_boolean(excel_row, col, *value)?;
                }
            }
        }
    }
    Ok(())
}

impl ExportPort for XlsxExporter {
    fn export(&self, sheets: &[StageSheet<'_>]) -> Result<PathBuf, String> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
        }

        let header = Format::new().set_bold();
        let mut workbook = Workbook::new();
        for stage in sheets {
            let sheet = workbook.add_worksheet();
            sheet.set_name(stage.name).map_err(|e| e.to_string())?;
            write_table(sheet, stage.table, &header)
                .map_err(|e| format!("sheet '{}': {}", stage.name, e))?;
            info!(sheet = stage.name, rows = stage.table.len(), "Wrote stage sheet");
        }

        workbook
            .save(&self.path)
            .map_err(|e| format!("cannot write {}: {}", self.path.display(), e))?;

        self.path
            .canonicalize()
            .map_err(|e| format!("cannot resolve {}: {}", self.path.display(), e))
    }
}
