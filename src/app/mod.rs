pub mod ports;
pub mod etl_use_case;

pub use etl_use_case::{EtlUseCase, StageOutputs};
