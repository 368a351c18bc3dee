// Pipeline ingestion: supplier feed and target schema loading

pub mod records;
pub mod schema;

pub use records::{load_records, AttributeRow};
pub use schema::{load_target_schema, TargetSchema};
