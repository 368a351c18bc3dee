use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single non-missing value. Missing values are `None` at the slot level,
/// so a present `Int(0)` is never confused with an absent cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Convert a JSON value into a cell. `null` maps to a missing slot,
    /// arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Option<Cell> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Cell::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Cell::Int)
                .or_else(|| n.as_f64().map(Cell::Float)),
            Value::String(s) => Some(Cell::Text(s.clone())),
            other => Some(Cell::Text(other.to_string())),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used for float coercion. NaN text counts as unparseable.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if !f.is_nan() => Some(*f),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }

    /// Integer view used for integer coercion. Integral floats ("2017.0") are accepted.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) => integral(*f),
            Cell::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
            Cell::Bool(_) => None,
        }
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Bool(b) => write!(f, "{}", b),
        }
    }
}

pub type Row = Vec<Option<Cell>>;

/// Column-ordered in-memory table. Every row has exactly one slot per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table. Repeated column names keep their first position.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Table::default();
        for column in columns {
            table.ensure_column(&column.into());
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Append a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Add an all-missing column if it does not exist yet and return its position.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.columns.len();
        self.columns.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        for row in &mut self.rows {
            row.push(None);
        }
        idx
    }

    /// Add (or overwrite) a column with the same value in every row.
    pub fn fill_column(&mut self, name: &str, value: Option<Cell>) {
        let idx = self.ensure_column(name);
        for row in &mut self.rows {
            row[idx] = value.clone();
        }
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    pub fn set(&mut self, row: usize, column: &str, value: Option<Cell>) {
        let idx = self.ensure_column(column);
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(idx)) {
            *slot = value;
        }
    }

    /// Iterate one column top to bottom. Unknown columns yield nothing.
    pub fn column(&self, name: &str) -> impl Iterator<Item = Option<&Cell>> + '_ {
        let idx = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| idx.map(|i| row[i].as_ref()))
    }

    /// Rewrite every slot of a column in place. No-op when the column is absent.
    pub fn map_column<F, E>(&mut self, name: &str, mut f: F) -> Result<(), E>
    where
        F: FnMut(usize, Option<Cell>) -> Result<Option<Cell>, E>,
    {
        let Some(idx) = self.column_index(name) else {
            return Ok(());
        };
        for (row_idx, row) in self.rows.iter_mut().enumerate() {
            let current = row[idx].take();
            row[idx] = f(row_idx, current)?;
        }
        Ok(())
    }

    /// Rewrite every cell of a column in place. Missing columns are left alone.
    pub fn map_cells<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(usize, Option<Cell>) -> Option<Cell>,
    {
        let Some(idx) = self.column_index(name) else {
            return;
        };
        for (row_idx, row) in self.rows.iter_mut().enumerate() {
            let current = row[idx].take();
            row[idx] = f(row_idx, current);
        }
    }

    pub fn remove_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.index.remove(name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        self.reindex();
        true
    }

    /// Apply a set of renames simultaneously. A renamed column replaces any
    /// column that already carried the target name.
    pub fn rename_columns(&mut self, renames: &HashMap<String, String>) {
        let targets: HashSet<&str> = self
            .columns
            .iter()
            .filter_map(|c| renames.get(c).map(String::as_str))
            .collect();
        let shadowed: Vec<String> = self
            .columns
            .iter()
            .filter(|c| targets.contains(c.as_str()) && !renames.contains_key(c.as_str()))
            .cloned()
            .collect();
        for column in shadowed {
            self.remove_column(&column);
        }
        for column in &mut self.columns {
            if let Some(target) = renames.get(column.as_str()) {
                *column = target.clone();
            }
        }
        self.reindex();
    }

    /// Build a new table holding only `columns`, in that order. Columns this
    /// table lacks come out all-missing.
    pub fn select(&self, columns: &[String]) -> Table {
        let mut out = Table::new(columns.iter().cloned());
        let sources: Vec<Option<usize>> = out
            .columns
            .iter()
            .map(|c| self.column_index(c))
            .collect();
        for row in &self.rows {
            out.rows.push(
                sources
                    .iter()
                    .map(|src| src.and_then(|i| row[i].clone()))
                    .collect(),
            );
        }
        out
    }

    fn reindex(&mut self) {
        // first position wins if a rename produced duplicates
        self.index.clear();
        for (idx, column) in self.columns.iter().enumerate() {
            self.index.entry(column.clone()).or_insert(idx);
        }
    }
}
