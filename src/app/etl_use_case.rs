use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::app::ports::{ExportPort, StageSheet};
use crate::config::{Config, FieldsConfig};
use crate::constants::{INTEGRATION_SHEET, NORMALIZATION_SHEET, PREPROCESSING_SHEET};
use crate::error::{EtlError, Result};
use crate::infra::{CountryTable, NominatimGeocoder, XlsxExporter};
use crate::pipeline::ingestion::{load_records, load_target_schema, AttributeRow, TargetSchema};
use crate::pipeline::processing::enrich::distinct_cities;
use crate::pipeline::processing::{
    integrate, reshape, DictionaryNormalizer, GeoEnricher, IntegrationRules, Normalizer,
};
use crate::pipeline::table::Table;

/// Tables produced by each stage, in the order they are exported.
#[derive(Debug, Clone)]
pub struct StageOutputs {
    pub preprocessed: Table,
    pub normalized: Table,
    pub integrated: Table,
}

impl StageOutputs {
    pub fn sheets(&self) -> [StageSheet<'_>; 3] {
        [
            StageSheet { name: PREPROCESSING_SHEET, table: &self.preprocessed },
            StageSheet { name: NORMALIZATION_SHEET, table: &self.normalized },
            StageSheet { name: INTEGRATION_SHEET, table: &self.integrated },
        ]
    }
}

/// Use case running the whole listing pipeline: load, reshape, enrich,
/// normalize, integrate and export.
pub struct EtlUseCase {
    fields: FieldsConfig,
    geo: GeoEnricher,
    normalizer: Box<dyn Normalizer + Send + Sync>,
    rules: IntegrationRules,
    exporter: Box<dyn ExportPort>,
}

impl EtlUseCase {
    pub fn new(
        fields: FieldsConfig,
        geo: GeoEnricher,
        normalizer: Box<dyn Normalizer + Send + Sync>,
        rules: IntegrationRules,
        exporter: Box<dyn ExportPort>,
    ) -> Self {
        Self {
            fields,
            geo,
            normalizer,
            rules,
            exporter,
        }
    }

    /// Wire the production adapters: Nominatim, the country table and the xlsx writer.
    pub fn from_config(config: &Config) -> Result<Self> {
        let geocoder = NominatimGeocoder::new(&config.geo).map_err(EtlError::Config)?;
        let countries = match &config.geo.countries_file {
            Some(path) => CountryTable::from_file(path)?,
            None => CountryTable::bundled()?,
        };
        let geo = GeoEnricher::new(Arc::new(geocoder), Arc::new(countries), config.geo.clone());

        Ok(Self::new(
            config.fields.clone(),
            geo,
            Box::new(DictionaryNormalizer::new(config.normalization.clone())),
            config.integration.clone(),
            Box::new(XlsxExporter::new(&config.paths.output)),
        ))
    }

    /// Run every transformation stage over already loaded inputs.
    #[instrument(skip_all, fields(attribute_rows = records.len()))]
    pub async fn transform(
        &self,
        records: &[AttributeRow],
        schema: &TargetSchema,
    ) -> Result<StageOutputs> {
        let wide = reshape(records, &self.fields)?;
        let preprocessed = self.geo.enrich(wide, &distinct_cities(records)).await?;
        let normalized = self.normalizer.normalize(preprocessed.clone());
        let integrated = integrate(normalized.clone(), schema, &self.rules);

        Ok(StageOutputs {
            preprocessed,
            normalized,
            integrated,
        })
    }

    /// Load both inputs, transform, and export. Returns the resolved output path.
    #[instrument(skip_all, fields(input = %input.display(), schema = %schema_path.display()))]
    pub async fn run(&self, input: &Path, schema_path: &Path) -> Result<PathBuf> {
        let records = load_records(input, &self.fields)?;
        let schema = load_target_schema(schema_path)?;
        let outputs = self.transform(&records, &schema).await?;

        let path = self.exporter.export(&outputs.sheets()).map_err(EtlError::Export)?;
        info!(path = %path.display(), records = outputs.integrated.len(), "Export complete");
        crate::observability::metrics::export::completed(outputs.integrated.len());
        Ok(path)
    }
}
