// Pipeline processing: reshape, geo enrichment, normalization, integration

pub mod reshape;
pub mod enrich;
pub mod normalize;
pub mod integrate;

pub use enrich::{CityMetadata, GeoEnricher};
pub use integrate::{integrate, IntegrationRules};
pub use normalize::{DictionaryNormalizer, NormalizationDictionaries, Normalizer};
pub use reshape::reshape;
