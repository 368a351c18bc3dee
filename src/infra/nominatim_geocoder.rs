use crate::app::ports::GeocoderPort;
use crate::config::GeoConfig;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

/// Nominatim search hit, only the fields we read
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
}

/// Geocoder backed by the OpenStreetMap Nominatim search API.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeoConfig) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl GeocoderPort for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn resolve(&self, city: &str) -> Result<String, String> {
        debug!("Geocoding city");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", city), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Geocoding request failed");
                format!("geocoding request failed: {}", e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("geocoder responded with status {}", status.as_u16()));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| format!("failed to parse geocoding response: {}", e))?;

        places
            .into_iter()
            .next()
            .map(|place| place.display_name)
            .ok_or_else(|| {
                warn!("Location not found by geocoding API");
                format!("location not found: {}", city)
            })
    }
}
