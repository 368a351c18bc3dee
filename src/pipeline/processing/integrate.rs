use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::constants::{NULL_SENTINEL, PRICE_ON_REQUEST_COLUMN};
use crate::pipeline::ingestion::TargetSchema;
use crate::pipeline::table::{Cell, Table};

/// How source columns are reconciled with the target schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IntegrationRules {
    /// Source column name -> target column name
    pub renames: HashMap<String, String>,
    /// Target column synthesized as `false` instead of the null sentinel
    pub price_on_request_column: String,
}

impl Default for IntegrationRules {
    fn default() -> Self {
        let renames = [
            ("BodyTypeText", "carType"),
            ("BodyColorText", "color"),
            ("ConditionTypeText", "condition"),
            ("City", "city"),
            ("MakeText", "make"),
            ("FirstRegYear", "manufacture_year"),
            ("Km", "mileage"),
            ("ModelTypeText", "model_variant"),
            ("ModelText", "model"),
            ("FirstRegMonth", "manufacture_month"),
            ("ConsumptionTotalText", "fuel_consumption_unit"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            renames,
            price_on_request_column: PRICE_ON_REQUEST_COLUMN.to_string(),
        }
    }
}

/// Reshape the normalized table into exactly the target schema.
///
/// Columns the data lacks are synthesized (`false` for price on request, the
/// null sentinel otherwise), the result is projected to schema order, and any
/// remaining missing slot is written as the null sentinel. The sentinel is
/// indistinguishable from a literal `"null"` text value after this step.
#[instrument(skip_all, fields(records = table.len(), schema_columns = schema.len()))]
pub fn integrate(mut table: Table, schema: &TargetSchema, rules: &IntegrationRules) -> Table {
    table.rename_columns(&rules.renames);

    let mut synthesized = 0usize;
    for column in schema.columns() {
        if table.has_column(column) {
            continue;
        }
        let default = if *column == rules.price_on_request_column {
            Cell::Bool(false)
        } else {
            Cell::text(NULL_SENTINEL)
        };
        table.fill_column(column, Some(default));
        synthesized += 1;
    }

    let mut projected = table.select(schema.columns());
    for column in schema.columns() {
        projected.map_cells(column, |_, cell| {
            Some(cell.unwrap_or_else(|| Cell::text(NULL_SENTINEL)))
        });
    }

    info!(
        synthesized,
        columns = projected.width(),
        "Integrated records into target schema"
    );
    crate::observability::metrics::integrate::synthesized_columns(synthesized);
    projected
}
