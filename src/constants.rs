//! Column and sheet names shared across the pipeline stages.
//! Source column names follow the supplier feed, derived names follow the target schema.

// Supplier feed fields
pub const ID_FIELD: &str = "ID";
pub const ATTRIBUTE_NAME_FIELD: &str = "Attribute Names";
pub const ATTRIBUTE_VALUE_FIELD: &str = "Attribute Values";
pub const KILOMETER_FIELD: &str = "Km";
pub const MILE_FIELD: &str = "ml";

pub const CITY_COLUMN: &str = "City";
pub const BODY_TYPE_COLUMN: &str = "BodyTypeText";
pub const MODEL_COLUMN: &str = "ModelText";
pub const MODEL_TYPE_COLUMN: &str = "ModelTypeText";
pub const CONSUMPTION_COLUMN: &str = "ConsumptionTotalText";
pub const CONDITION_COLUMN: &str = "ConditionTypeText";
pub const REG_MONTH_COLUMN: &str = "FirstRegMonth";
pub const REG_YEAR_COLUMN: &str = "FirstRegYear";

// Columns derived during pre-processing
pub const MILEAGE_UNIT_COLUMN: &str = "mileage_unit";
pub const TYPE_COLUMN: &str = "type";
pub const COUNTRY_COLUMN: &str = "country";
pub const ZIP_COLUMN: &str = "zip";
pub const CURRENCY_COLUMN: &str = "currency";

pub const KILOMETER_UNIT: &str = "kilometer";
pub const MILE_UNIT: &str = "mile";
pub const CAR_TYPE: &str = "car";

// Target schema
pub const PRICE_ON_REQUEST_COLUMN: &str = "price_on_request";

/// Literal written for any missing value in the integration sheet.
pub const NULL_SENTINEL: &str = "null";

// Output workbook
pub const PREPROCESSING_SHEET: &str = "Pre-processing";
pub const NORMALIZATION_SHEET: &str = "Normalization";
pub const INTEGRATION_SHEET: &str = "Integration";

// Default locations
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_INPUT_PATH: &str = "data/supplier_car.json";
pub const DEFAULT_SCHEMA_PATH: &str = "data/Target_Data.xlsx";
pub const DEFAULT_OUTPUT_PATH: &str = "output/results.xlsx";
pub const CONFIG_PATH_ENV: &str = "LISTING_ETL_CONFIG";

// Geocoding
pub const DEFAULT_GEOCODER_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_USER_AGENT: &str = "listing_etl/0.1 (vehicle listing ETL)";
