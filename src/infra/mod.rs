// Adapters for the application ports

pub mod country_table;
pub mod nominatim_geocoder;
pub mod xlsx_exporter;

pub use country_table::CountryTable;
pub use nominatim_geocoder::NominatimGeocoder;
pub use xlsx_exporter::XlsxExporter;
