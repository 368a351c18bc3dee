use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::constants::{CONDITION_COLUMN, TYPE_COLUMN};
use crate::pipeline::table::{Cell, Table};

/// Static lookups from listing text (English and German) to integer codes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalizationDictionaries {
    pub condition: HashMap<String, u8>,
    #[serde(rename = "type")]
    pub vehicle_type: HashMap<String, u8>,
}

impl Default for NormalizationDictionaries {
    fn default() -> Self {
        let condition = [
            ("New", 0),
            ("Neu", 0),
            ("Original Condition", 1),
            ("Originalzustand", 1),
            ("Used with guarantee", 2),
            ("Gebraucht mit Garantie", 2),
            ("Used", 3),
            ("Gebraucht", 3),
            ("Restored", 4),
            ("Restauriert", 4),
            ("Restoration Project", 5),
            ("Restaurierungsprojekt", 5),
            ("Antique", 6),
            ("Oldtimer", 6),
            ("demonstration model", 7),
            ("Vorführmodell", 7),
            ("Occasion", 8),
        ];
        let vehicle_type = [("car", 0), ("Wagen", 0), ("motorcycle", 1), ("motorrad", 1)];

        Self {
            condition: to_map(&condition),
            vehicle_type: to_map(&vehicle_type),
        }
    }
}

fn to_map(entries: &[(&str, u8)]) -> HashMap<String, u8> {
    entries
        .iter()
        .map(|(text, code)| (text.to_string(), *code))
        .collect()
}

/// Map a cell through a dictionary. Anything outside the keys, including a
/// missing cell, comes back missing.
pub fn lookup_code(dictionary: &HashMap<String, u8>, cell: Option<&Cell>) -> Option<Cell> {
    let key = match cell? {
        Cell::Text(text) => text.clone(),
        other => other.to_string(),
    };
    dictionary.get(&key).map(|code| Cell::Int(i64::from(*code)))
}

/// Trait for turning categorical columns into codes
pub trait Normalizer {
    fn normalize(&self, table: Table) -> Table;
}

/// Normalizer for the condition and type columns
pub struct DictionaryNormalizer {
    dictionaries: NormalizationDictionaries,
}

impl DictionaryNormalizer {
    pub fn new(dictionaries: NormalizationDictionaries) -> Self {
        Self { dictionaries }
    }
}

impl Default for DictionaryNormalizer {
    fn default() -> Self {
        Self::new(NormalizationDictionaries::default())
    }
}

impl Normalizer for DictionaryNormalizer {
    #[instrument(skip_all, fields(records = table.len()))]
    fn normalize(&self, mut table: Table) -> Table {
        let mut unmapped = 0usize;
        for (column, dictionary) in [
            (CONDITION_COLUMN, &self.dictionaries.condition),
            (TYPE_COLUMN, &self.dictionaries.vehicle_type),
        ] {
            table.ensure_column(column);
            table.map_cells(column, |_, cell| {
                let code = lookup_code(dictionary, cell.as_ref());
                if cell.is_some() && code.is_none() {
                    unmapped += 1;
                }
                code
            });
        }

        info!(unmapped, "Normalized condition and type codes");
        crate::observability::metrics::normalize::unmapped_values(unmapped);
        table
    }
}
