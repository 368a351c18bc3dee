// Observability: run metrics

pub mod metrics;
