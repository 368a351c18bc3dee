use anyhow::Result;
use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use listing_etl::app::ports::{CountryInfo, CountryMetadataPort, GeocoderPort};
use listing_etl::app::EtlUseCase;
use listing_etl::config::{FieldsConfig, GeoConfig, GeoFailurePolicy};
use listing_etl::error::EtlError;
use listing_etl::infra::{CountryTable, XlsxExporter};
use listing_etl::pipeline::ingestion::{load_records, TargetSchema};
use listing_etl::pipeline::processing::{DictionaryNormalizer, GeoEnricher, IntegrationRules};
use listing_etl::pipeline::table::Cell;

const TARGET_COLUMNS: [&str; 16] = [
    "carType",
    "color",
    "condition",
    "currency",
    "make",
    "model",
    "model_variant",
    "city",
    "country",
    "zip",
    "mileage",
    "mileage_unit",
    "manufacture_year",
    "manufacture_month",
    "fuel_consumption_unit",
    "price_on_request",
];

/// Geocoder answering from a fixed table and counting every call.
struct CountingGeocoder {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl GeocoderPort for CountingGeocoder {
    async fn resolve(&self, city: &str) -> std::result::Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match city {
            "Zürich" => Ok("Zürich, Bezirk Zürich, Zürich, Schweiz/Suisse/Svizzera/Svizra".to_string()),
            "Basel" => Ok("Basel, Basel-Stadt, Schweiz/Suisse/Svizzera/Svizra".to_string()),
            "Berlin" => Ok("Berlin, 10117, Deutschland".to_string()),
            other => Err(format!("no result for '{}'", other)),
        }
    }
}

/// Country port with a single entry listing two currencies.
struct GermanyOnly;

impl CountryMetadataPort for GermanyOnly {
    fn lookup(&self, country_name: &str) -> std::result::Result<CountryInfo, String> {
        match country_name {
            "Deutschland" => Ok(CountryInfo {
                alpha2: "DE".to_string(),
                alpha3: "DEU".to_string(),
                currencies: vec!["XEU".to_string(), "EUR".to_string()],
            }),
            other => Err(format!("unknown country {}", other)),
        }
    }
}

fn feed_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/resources/supplier_feed.json")
}

fn write_target_workbook(path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, name) in TARGET_COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *name)?;
    }
    workbook.save(path)?;
    Ok(())
}

fn use_case(output: &Path, geo: GeoConfig, calls: Arc<AtomicUsize>) -> Result<EtlUseCase> {
    let enricher = GeoEnricher::new(
        Arc::new(CountingGeocoder { calls }),
        Arc::new(CountryTable::bundled()?),
        geo,
    );
    Ok(EtlUseCase::new(
        FieldsConfig::default(),
        enricher,
        Box::new(DictionaryNormalizer::default()),
        IntegrationRules::default(),
        Box::new(XlsxExporter::new(output)),
    ))
}

fn column_of(header: &[Data], name: &str) -> usize {
    header
        .iter()
        .position(|cell| cell == &Data::String(name.to_string()))
        .unwrap_or_else(|| panic!("missing column {name}"))
}

#[tokio::test]
async fn test_feed_to_workbook() -> Result<()> {
    let dir = tempdir()?;
    let schema_path = dir.path().join("target.xlsx");
    let output_path = dir.path().join("out/results.xlsx");
    write_target_workbook(&schema_path)?;

    let calls = Arc::new(AtomicUsize::new(0));
    let etl = use_case(&output_path, GeoConfig::default(), calls.clone())?;
    let written = etl.run(&feed_path(), &schema_path).await?;

    assert!(written.ends_with("results.xlsx"));
    // Zürich once for both listings, Basel once for the repeated City attribute
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let mut workbook = open_workbook_auto(&written)?;
    assert_eq!(
        workbook.sheet_names(),
        vec!["Pre-processing", "Normalization", "Integration"]
    );

    let pre = workbook.worksheet_range("Pre-processing")?;
    let pre_rows: Vec<&[Data]> = pre.rows().collect();
    let header = pre_rows[0];
    assert_eq!(header[0], Data::String("ID".to_string()));
    assert_eq!(pre_rows.len(), 3);
    // Rows are ordered by ID
    assert_eq!(pre_rows[1][0], Data::Float(7.0));
    assert_eq!(pre_rows[2][0], Data::Float(100.0));
    let golf = pre_rows[2];
    assert_eq!(golf[column_of(header, "ModelTypeText")], Data::String(" GTI".to_string()));
    assert_eq!(
        golf[column_of(header, "ConsumptionTotalText")],
        Data::String("l_km_consumption".to_string())
    );
    assert_eq!(golf[column_of(header, "City")], Data::String("Zürich".to_string()));
    assert_eq!(golf[column_of(header, "type")], Data::String("car".to_string()));
    assert_eq!(golf[column_of(header, "currency")], Data::String("CHF".to_string()));
    assert_eq!(pre_rows[1][column_of(header, "ModelTypeText")], Data::Empty);

    let normalized = workbook.worksheet_range("Normalization")?;
    let norm_rows: Vec<&[Data]> = normalized.rows().collect();
    let condition = column_of(norm_rows[0], "ConditionTypeText");
    assert_eq!(norm_rows[1][condition], Data::Float(6.0));
    assert_eq!(norm_rows[2][condition], Data::Float(8.0));
    assert_eq!(norm_rows[2][column_of(norm_rows[0], "type")], Data::Float(0.0));

    let integrated = workbook.worksheet_range("Integration")?;
    let int_rows: Vec<&[Data]> = integrated.rows().collect();
    let expected_header: Vec<Data> = TARGET_COLUMNS
        .iter()
        .map(|c| Data::String(c.to_string()))
        .collect();
    assert_eq!(int_rows[0], expected_header.as_slice());
    assert_eq!(int_rows.len(), 3);
    for row in &int_rows[1..] {
        assert_eq!(row[column_of(int_rows[0], "color")], Data::String("null".to_string()));
        assert_eq!(row[column_of(int_rows[0], "price_on_request")], Data::Bool(false));
        assert_eq!(row[column_of(int_rows[0], "country")], Data::String("CH".to_string()));
        assert_eq!(row[column_of(int_rows[0], "zip")], Data::String("CHE".to_string()));
    }
    Ok(())
}

#[tokio::test]
async fn test_stage_tables_before_export() -> Result<()> {
    let dir = tempdir()?;
    let calls = Arc::new(AtomicUsize::new(0));
    let etl = use_case(&dir.path().join("unused.xlsx"), GeoConfig::default(), calls)?;

    let records = load_records(&feed_path(), &FieldsConfig::default())?;
    let schema = TargetSchema::new(TARGET_COLUMNS)?;
    let outputs = etl.transform(&records, &schema).await?;

    let pre = &outputs.preprocessed;
    assert_eq!(pre.len(), 2);
    assert_eq!(pre.get(1, "Km"), Some(&Cell::Float(45000.0)));
    assert_eq!(pre.get(1, "FirstRegMonth"), Some(&Cell::Float(5.0)));
    assert_eq!(pre.get(1, "FirstRegYear"), Some(&Cell::Int(2012)));
    assert_eq!(pre.get(0, "Km"), None);
    assert_eq!(pre.get(0, "mileage_unit"), Some(&Cell::text("kilometer")));
    assert_eq!(pre.get(0, "type"), None);

    // Hp is not in the target schema and the mileage unit is kept
    let integrated = &outputs.integrated;
    assert!(!integrated.has_column("Hp"));
    assert_eq!(integrated.get(0, "mileage"), Some(&Cell::text("null")));
    assert_eq!(integrated.get(1, "mileage"), Some(&Cell::Float(45000.0)));
    assert_eq!(integrated.get(1, "model_variant"), Some(&Cell::text(" GTI")));
    assert_eq!(integrated.get(1, "manufacture_year"), Some(&Cell::Int(2012)));
    Ok(())
}

#[tokio::test]
async fn test_unknown_city_fails_run_without_output() -> Result<()> {
    let dir = tempdir()?;
    let feed = dir.path().join("feed.json");
    std::fs::write(
        &feed,
        concat!(
            r#"{"ID": 1, "MakeText": "FIAT", "Attribute Names": "City", "Attribute Values": "Atlantis"}"#,
            "\n",
            r#"{"ID": 1, "MakeText": "FIAT", "Attribute Names": "FirstRegYear", "Attribute Values": "2001"}"#,
            "\n",
        ),
    )?;
    let schema_path = dir.path().join("target.xlsx");
    write_target_workbook(&schema_path)?;
    let output = dir.path().join("results.xlsx");

    let geo = GeoConfig {
        retries: 1,
        ..GeoConfig::default()
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let etl = use_case(&output, geo, calls.clone())?;
    let result = etl.run(&feed, &schema_path).await;

    assert!(matches!(result, Err(EtlError::GeoResolution { ref city, .. }) if city == "Atlantis"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn test_null_policy_exports_unresolved_city() -> Result<()> {
    let dir = tempdir()?;
    let feed = dir.path().join("feed.json");
    std::fs::write(
        &feed,
        concat!(
            r#"{"ID": 1, "Attribute Names": "City", "Attribute Values": "Atlantis"}"#,
            "\n",
            r#"{"ID": 1, "Attribute Names": "FirstRegYear", "Attribute Values": "2001"}"#,
            "\n",
            r#"{"ID": 2, "Attribute Names": "City", "Attribute Values": "Basel"}"#,
            "\n",
            r#"{"ID": 2, "Attribute Names": "FirstRegYear", "Attribute Values": "2019"}"#,
            "\n",
        ),
    )?;
    let schema_path = dir.path().join("target.xlsx");
    write_target_workbook(&schema_path)?;

    let geo = GeoConfig {
        retries: 0,
        on_failure: GeoFailurePolicy::Null,
        ..GeoConfig::default()
    };
    let records = load_records(&feed, &FieldsConfig::default())?;
    let schema = TargetSchema::new(TARGET_COLUMNS)?;
    let etl = use_case(&dir.path().join("results.xlsx"), geo, Arc::new(AtomicUsize::new(0)))?;
    let outputs = etl.transform(&records, &schema).await?;

    assert_eq!(outputs.preprocessed.get(0, "country"), None);
    assert_eq!(outputs.preprocessed.get(1, "country"), Some(&Cell::text("CH")));
    assert_eq!(outputs.integrated.get(0, "currency"), Some(&Cell::text("null")));
    assert_eq!(outputs.integrated.get(1, "currency"), Some(&Cell::text("CHF")));
    Ok(())
}

#[tokio::test]
async fn test_missing_feed_is_reported() -> Result<()> {
    let dir = tempdir()?;
    let etl = use_case(
        &dir.path().join("results.xlsx"),
        GeoConfig::default(),
        Arc::new(AtomicUsize::new(0)),
    )?;

    let result = etl
        .run(&dir.path().join("absent.json"), &dir.path().join("target.xlsx"))
        .await;

    assert!(matches!(result, Err(EtlError::InputNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_shared_city_is_resolved_once() -> Result<()> {
    let dir = tempdir()?;
    let feed = dir.path().join("feed.json");
    std::fs::write(
        &feed,
        concat!(
            r#"{"ID": 1, "ModelText": "GOLF", "ModelTypeText": "GOLF GTI", "Attribute Names": "City", "Attribute Values": "Berlin"}"#,
            "\n",
            r#"{"ID": 1, "ModelText": "GOLF", "ModelTypeText": "GOLF GTI", "Attribute Names": "FirstRegYear", "Attribute Values": "2016"}"#,
            "\n",
            r#"{"ID": 2, "ModelText": "A4", "ModelTypeText": "A4 Avant", "Attribute Names": "City", "Attribute Values": "Berlin"}"#,
            "\n",
            r#"{"ID": 2, "ModelText": "A4", "ModelTypeText": "A4 Avant", "Attribute Names": "FirstRegYear", "Attribute Values": "2019"}"#,
            "\n",
        ),
    )?;

    let calls = Arc::new(AtomicUsize::new(0));
    let enricher = GeoEnricher::new(
        Arc::new(CountingGeocoder { calls: calls.clone() }),
        Arc::new(GermanyOnly),
        GeoConfig::default(),
    );
    let etl = EtlUseCase::new(
        FieldsConfig::default(),
        enricher,
        Box::new(DictionaryNormalizer::default()),
        IntegrationRules::default(),
        Box::new(XlsxExporter::new(dir.path().join("results.xlsx"))),
    );

    let records = load_records(&feed, &FieldsConfig::default())?;
    let schema = TargetSchema::new(TARGET_COLUMNS)?;
    let outputs = etl.transform(&records, &schema).await?;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let pre = &outputs.preprocessed;
    assert_eq!(pre.len(), 2);
    for row in 0..2 {
        assert_eq!(pre.get(row, "country"), Some(&Cell::text("DE")));
        assert_eq!(pre.get(row, "zip"), Some(&Cell::text("DEU")));
        assert_eq!(pre.get(row, "currency"), Some(&Cell::text("EUR")));
    }
    assert_eq!(pre.get(0, "ModelTypeText"), Some(&Cell::text(" GTI")));
    assert_eq!(pre.get(1, "ModelTypeText"), Some(&Cell::text(" AVANT")));
    assert_eq!(outputs.integrated.get(0, "model_variant"), Some(&Cell::text(" GTI")));
    Ok(())
}

#[tokio::test]
async fn test_every_raw_city_is_looked_up() -> Result<()> {
    let dir = tempdir()?;
    let feed = dir.path().join("feed.json");
    // Only the first flat City of record 1 survives the pivot
    std::fs::write(
        &feed,
        concat!(
            r#"{"ID": 1, "City": "Zürich", "Attribute Names": "FirstRegYear", "Attribute Values": "2001"}"#,
            "\n",
            r#"{"ID": 1, "City": "Atlantis", "Attribute Names": "Km", "Attribute Values": "1000"}"#,
            "\n",
        ),
    )?;
    let schema_path = dir.path().join("target.xlsx");
    write_target_workbook(&schema_path)?;
    let output = dir.path().join("results.xlsx");

    let geo = GeoConfig {
        retries: 0,
        ..GeoConfig::default()
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let etl = use_case(&output, geo, calls.clone())?;
    let result = etl.run(&feed, &schema_path).await;

    assert!(matches!(result, Err(EtlError::GeoResolution { ref city, .. }) if city == "Atlantis"));
    assert!(!output.exists());
    Ok(())
}
