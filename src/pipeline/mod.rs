// Data processing pipeline: ingestion, processing, and the shared table model

pub mod ingestion;
pub mod processing;
pub mod table;

pub use table::{Cell, Row, Table};
