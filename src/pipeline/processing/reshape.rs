use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, instrument, warn};

use crate::config::FieldsConfig;
use crate::constants::{
    BODY_TYPE_COLUMN, CAR_TYPE, CONSUMPTION_COLUMN, KILOMETER_UNIT, MILEAGE_UNIT_COLUMN,
    MILE_UNIT, MODEL_COLUMN, MODEL_TYPE_COLUMN, REG_MONTH_COLUMN, REG_YEAR_COLUMN, TYPE_COLUMN,
};
use crate::error::{EtlError, Result};
use crate::pipeline::ingestion::AttributeRow;
use crate::pipeline::table::{Cell, Row, Table};

static NON_LETTERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z]").unwrap());

/// Turn the long attribute feed into one cleaned row per record.
#[instrument(skip_all, fields(attribute_rows = rows.len()))]
pub fn reshape(rows: &[AttributeRow], fields: &FieldsConfig) -> Result<Table> {
    let mut table = pivot_records(rows, &fields.id);
    clean_model_type(&mut table);
    rewrite_consumption(&mut table);
    reconcile_mileage(&mut table, &fields.kilometer, &fields.mile);
    derive_vehicle_type(&mut table);
    coerce_types(&mut table, &fields.id, &fields.kilometer)?;

    info!(
        records = table.len(),
        columns = table.width(),
        "Reshaped attribute rows into wide records"
    );
    crate::observability::metrics::reshape::wide_rows(table.len());
    Ok(table)
}

/// Fold attribute rows grouped by ID into wide rows.
///
/// Rows are stably sorted by ID first. Flat fields come from the first row of
/// each group, and the first value seen for an attribute name wins. Column
/// order is the ID, flat fields in first-seen order, then attribute names sorted.
pub fn pivot_records(rows: &[AttributeRow], id_column: &str) -> Table {
    let mut flat_columns = vec![id_column.to_string()];
    let mut seen_flat: HashSet<&str> = HashSet::from([id_column]);
    for row in rows {
        for (name, _) in &row.fields {
            if seen_flat.insert(name.as_str()) {
                flat_columns.push(name.clone());
            }
        }
    }
    let attribute_columns: BTreeSet<&str> = rows
        .iter()
        .filter_map(|r| r.attribute_name.as_deref())
        .filter(|name| !seen_flat.contains(name))
        .collect();

    let mut table = Table::new(
        flat_columns
            .iter()
            .map(String::as_str)
            .chain(attribute_columns.iter().copied()),
    );

    let mut sorted: Vec<&AttributeRow> = rows.iter().collect();
    sorted.sort_by_key(|r| r.id);

    let mut duplicates = 0usize;
    let mut ignored_keys = 0usize;
    for group in sorted.chunk_by(|a, b| a.id == b.id) {
        let head = group[0];
        let mut row: Row = vec![None; table.width()];
        row[0] = Some(Cell::Int(head.id));
        for (name, value) in &head.fields {
            if let Some(idx) = table.column_index(name) {
                row[idx] = value.clone();
            }
        }

        let mut seen_attributes: HashSet<&str> = HashSet::new();
        for attribute in group {
            let Some(name) = attribute.attribute_name.as_deref() else {
                continue;
            };
            if name == id_column {
                ignored_keys += 1;
                continue;
            }
            if !seen_attributes.insert(name) {
                duplicates += 1;
                continue;
            }
            if let (Some(idx), Some(value)) = (table.column_index(name), &attribute.attribute_value) {
                row[idx] = Some(value.clone());
            }
        }
        table.push_row(row);
    }

    if duplicates > 0 {
        warn!(duplicates, "Dropped repeated attributes, first value kept");
    }
    if ignored_keys > 0 {
        warn!(ignored_keys, id_column, "Dropped attributes named like the record key");
    }
    table
}

/// Upper-case the model type and drop the model name from it.
pub fn strip_model_text(model_type: &str, model: Option<&str>) -> String {
    let upper = model_type.to_uppercase();
    match model.map(str::to_uppercase) {
        Some(model) if !model.is_empty() => upper.replace(&model, ""),
        _ => upper,
    }
}

fn clean_model_type(table: &mut Table) {
    let models: Vec<Option<String>> = table
        .column(MODEL_COLUMN)
        .map(|cell| cell.map(Cell::to_string))
        .collect();
    table.map_cells(MODEL_TYPE_COLUMN, |row, cell| {
        cell.map(|value| {
            let model = models.get(row).and_then(|m| m.as_deref());
            Cell::Text(strip_model_text(&value.to_string(), model))
        })
    });
}

/// Rewrite `"4.5L/100km"` style consumption text to `"L_km_consumption"`.
/// Returns `None` when there is no slash to split on.
pub fn rewrite_consumption_unit(text: &str) -> Option<String> {
    let mut parts = text.split('/');
    let (Some(first), Some(second)) = (parts.next(), parts.next()) else {
        return None;
    };
    Some(format!(
        "{}_{}_consumption",
        NON_LETTERS.replace_all(first, ""),
        NON_LETTERS.replace_all(second, "")
    ))
}

fn rewrite_consumption(table: &mut Table) {
    table.map_cells(CONSUMPTION_COLUMN, |_, cell| match cell {
        Some(Cell::Text(text)) => match rewrite_consumption_unit(&text) {
            Some(rewritten) => Some(Cell::Text(rewritten)),
            None => Some(Cell::Text(text)),
        },
        other => other,
    });
}

/// Store mileage under the kilometer column and record its unit per row.
pub fn reconcile_mileage(table: &mut Table, kilometer: &str, mile: &str) {
    let has_km = table.has_column(kilometer);
    let has_mile = table.has_column(mile);

    match (has_km, has_mile) {
        (true, false) => table.fill_column(MILEAGE_UNIT_COLUMN, Some(Cell::text(KILOMETER_UNIT))),
        (false, true) => {
            let miles: Vec<Option<Cell>> = table.column(mile).map(|c| c.cloned()).collect();
            table.ensure_column(kilometer);
            for (row, value) in miles.into_iter().enumerate() {
                table.set(row, kilometer, value);
            }
            table.fill_column(MILEAGE_UNIT_COLUMN, Some(Cell::text(MILE_UNIT)));
        }
        (true, true) => {
            table.fill_column(MILEAGE_UNIT_COLUMN, Some(Cell::text(KILOMETER_UNIT)));
            for row in 0..table.len() {
                if table.get(row, kilometer).is_none() {
                    let miles = table.get(row, mile).cloned();
                    table.set(row, kilometer, miles);
                    table.set(row, MILEAGE_UNIT_COLUMN, Some(Cell::text(MILE_UNIT)));
                }
            }
        }
        (false, false) => {
            warn!(kilometer, mile, "No mileage column in feed, unit left empty");
            table.ensure_column(MILEAGE_UNIT_COLUMN);
        }
    }
}

/// Mark rows that carry a body type as cars.
fn derive_vehicle_type(table: &mut Table) {
    let is_car: Vec<bool> = table.column(BODY_TYPE_COLUMN).map(|c| c.is_some()).collect();
    table.ensure_column(TYPE_COLUMN);
    for (row, car) in is_car.into_iter().enumerate() {
        if car {
            table.set(row, TYPE_COLUMN, Some(Cell::text(CAR_TYPE)));
        }
    }
}

/// Mileage and month become floats (nullable), the registration year an integer (required).
pub fn coerce_types(table: &mut Table, id_column: &str, kilometer: &str) -> Result<()> {
    let ids: Vec<String> = table
        .column(id_column)
        .map(|c| c.map(Cell::to_string).unwrap_or_default())
        .collect();
    let coercion_error = |column: &str, row: usize, value: &str| EtlError::TypeCoercion {
        column: column.to_string(),
        record: ids.get(row).cloned().unwrap_or_default(),
        value: value.to_string(),
    };

    for column in [kilometer, REG_MONTH_COLUMN] {
        table.map_column(column, |row, cell| match cell {
            None => Ok(None),
            Some(value) => value
                .to_f64()
                .map(|f| Some(Cell::Float(f)))
                .ok_or_else(|| coercion_error(column, row, &value.to_string())),
        })?;
    }

    if !table.has_column(REG_YEAR_COLUMN) {
        return Err(coercion_error(REG_YEAR_COLUMN, 0, "column missing"));
    }
    table.map_column(REG_YEAR_COLUMN, |row, cell| match cell {
        None => Err(coercion_error(REG_YEAR_COLUMN, row, "null")),
        Some(value) => value
            .to_i64()
            .map(|i| Some(Cell::Int(i)))
            .ok_or_else(|| coercion_error(REG_YEAR_COLUMN, row, &value.to_string())),
    })
}
