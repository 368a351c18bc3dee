use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{CountryInfo, CountryMetadataPort, GeocoderPort};
use crate::config::{GeoConfig, GeoFailurePolicy};
use crate::constants::{CITY_COLUMN, COUNTRY_COLUMN, CURRENCY_COLUMN, ZIP_COLUMN};
use crate::error::{EtlError, Result};
use crate::pipeline::ingestion::AttributeRow;
use crate::pipeline::table::{Cell, Table};

/// Country-level attributes shared by every listing in a city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityMetadata {
    /// ISO 3166 alpha-2 code
    pub country: String,
    /// ISO 3166 alpha-3 code, exported as `zip`
    pub zip: String,
    pub currency: String,
}

/// `None` marks a city that failed to resolve under the `null` failure policy.
pub type CityLookup = HashMap<String, Option<CityMetadata>>;

/// Extract the country name from a geocoder location description.
///
/// Takes the last comma-separated segment; when that segment lists the name in
/// several languages separated by `/`, the second spelling is used. This is
/// tied to the Nominatim `display_name` format.
pub fn country_from_location(description: &str) -> Option<String> {
    let last = description.rsplit(',').next()?.trim();
    let name = match last.split_once('/') {
        Some((_, rest)) => rest.split('/').next().unwrap_or(rest),
        None => last,
    }
    .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Pick the listing currency from a country's currency list.
pub fn pick_currency(info: &CountryInfo, index: usize) -> Option<String> {
    info.currencies.get(index).cloned()
}

/// Distinct non-empty city strings of the raw feed, in first-seen order.
///
/// Both a flat `City` field and `City` attributes count, on every row, so a
/// city that the pivot later drops is still looked up.
pub fn distinct_cities(rows: &[AttributeRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .flat_map(|row| {
            let flat = row
                .fields
                .iter()
                .filter(|(name, _)| name == CITY_COLUMN)
                .filter_map(|(_, value)| value.as_ref());
            let attribute = row
                .attribute_value
                .as_ref()
                .filter(|_| row.attribute_name.as_deref() == Some(CITY_COLUMN));
            flat.chain(attribute)
        })
        .map(Cell::to_string)
        .filter(|city| !city.is_empty() && seen.insert(city.clone()))
        .collect()
}

/// Resolves each distinct city once and joins the result back onto the table.
#[derive(Clone)]
pub struct GeoEnricher {
    geocoder: Arc<dyn GeocoderPort>,
    countries: Arc<dyn CountryMetadataPort>,
    settings: GeoConfig,
}

impl GeoEnricher {
    pub fn new(
        geocoder: Arc<dyn GeocoderPort>,
        countries: Arc<dyn CountryMetadataPort>,
        settings: GeoConfig,
    ) -> Self {
        Self {
            geocoder,
            countries,
            settings,
        }
    }

    /// Resolve `cities` and add `country`, `zip` and `currency` columns keyed
    /// by the city column.
    #[instrument(skip_all, fields(records = table.len(), cities = cities.len()))]
    pub async fn enrich(&self, mut table: Table, cities: &[String]) -> Result<Table> {
        let lookup = self.resolve_cities(cities).await?;
        apply_city_metadata(&mut table, &lookup);
        Ok(table)
    }

    /// One lookup per city, at most `max_concurrent_lookups` in flight.
    pub async fn resolve_cities(&self, cities: &[String]) -> Result<CityLookup> {
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_lookups.max(1)));
        let mut tasks = JoinSet::new();

        for city in cities {
            let enricher = self.clone();
            let permits = permits.clone();
            let city = city.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let outcome = enricher.resolve_city(&city).await;
                (city, outcome)
            });
        }

        let mut lookup = CityLookup::with_capacity(cities.len());
        while let Some(joined) = tasks.join_next().await {
            let (city, outcome) = joined.map_err(|e| EtlError::GeoResolution {
                city: "<unknown>".to_string(),
                reason: format!("lookup task failed: {}", e),
            })?;
            match outcome {
                Ok(metadata) => {
                    crate::observability::metrics::geo::lookup("resolved");
                    lookup.insert(city, Some(metadata));
                }
                Err(err) => {
                    crate::observability::metrics::geo::lookup("failed");
                    match self.settings.on_failure {
                        GeoFailurePolicy::Fail => return Err(err),
                        GeoFailurePolicy::Null => {
                            warn!(city = %city, error = %err, "City left without country metadata");
                            lookup.insert(city, None);
                        }
                    }
                }
            }
        }

        info!(
            cities = cities.len(),
            resolved = lookup.values().filter(|m| m.is_some()).count(),
            "Resolved city metadata"
        );
        Ok(lookup)
    }

    async fn resolve_city(&self, city: &str) -> Result<CityMetadata> {
        let description = self.geocode_with_retry(city).await?;
        let failure = |reason: String| EtlError::GeoResolution {
            city: city.to_string(),
            reason,
        };

        let country_name = country_from_location(&description)
            .ok_or_else(|| failure(format!("no country in location '{}'", description)))?;
        let info = self.countries.lookup(&country_name).map_err(&failure)?;
        let currency = pick_currency(&info, self.settings.currency_index).ok_or_else(|| {
            failure(format!(
                "{} lists {} currencies, none at index {}",
                country_name,
                info.currencies.len(),
                self.settings.currency_index
            ))
        })?;

        debug!(city, country = %info.alpha2, currency = %currency, "Resolved city");
        Ok(CityMetadata {
            country: info.alpha2,
            zip: info.alpha3,
            currency,
        })
    }

    async fn geocode_with_retry(&self, city: &str) -> Result<String> {
        let attempts = self.settings.retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.settings.timeout(), self.geocoder.resolve(city)).await {
                Ok(Ok(description)) => return Ok(description),
                Ok(Err(e)) => last_error = e,
                Err(_) => {
                    last_error = format!("timed out after {}s", self.settings.timeout_secs)
                }
            }
            if attempt < attempts {
                warn!(city, attempt, error = %last_error, "Geocode attempt failed, retrying");
            }
        }

        Err(EtlError::GeoResolution {
            city: city.to_string(),
            reason: format!("{} (after {} attempts)", last_error, attempts),
        })
    }
}

/// Broadcast per-city metadata onto every row by its city value.
pub fn apply_city_metadata(table: &mut Table, lookup: &CityLookup) {
    let cities: Vec<Option<String>> = table
        .column(CITY_COLUMN)
        .map(|c| c.map(Cell::to_string))
        .collect();
    for column in [COUNTRY_COLUMN, ZIP_COLUMN, CURRENCY_COLUMN] {
        table.ensure_column(column);
    }

    for (row, city) in cities.into_iter().enumerate() {
        let Some(metadata) = city.and_then(|c| lookup.get(&c).cloned().flatten()) else {
            continue;
        };
        table.set(row, COUNTRY_COLUMN, Some(Cell::Text(metadata.country)));
        table.set(row, ZIP_COLUMN, Some(Cell::Text(metadata.zip)));
        table.set(row, CURRENCY_COLUMN, Some(Cell::Text(metadata.currency)));
    }
}
