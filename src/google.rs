use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::model::{GeocodeResult, GeocodeSuggestion};
use crate::providers::{GeocodeProvider, ProviderHit};

const HTTP_TIMEOUT_SECS: u64 = 10;

/// Primary commercial adapter against the Google Maps web services.
/// Constructed only when an API key is configured; absence of credentials
/// skips this provider rather than erroring.
pub struct GoogleProvider {
    http: Client,
    settings: GoogleSettings,
}

#[derive(Clone)]
struct GoogleSettings {
    api_key: SecretString,
    geocode_endpoint: String,
    autocomplete_endpoint: String,
    details_endpoint: String,
}

impl GoogleProvider {
    pub fn maybe_new(config: &AppConfig) -> AppResult<Option<Self>> {
        let Some(api_key) = config.google_api_key.clone() else {
            return Ok(None);
        };

        let base = config.google_api_base.trim_end_matches('/');
        let http = Client::builder()
            .user_agent(concat!("geocascade/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Some(Self {
            http,
            settings: GoogleSettings {
                api_key,
                geocode_endpoint: format!("{base}/maps/api/geocode/json"),
                autocomplete_endpoint: format!("{base}/maps/api/place/autocomplete/json"),
                details_endpoint: format!("{base}/maps/api/place/details/json"),
            },
        }))
    }

    async fn geocode_request(&self, params: &[(&str, &str)]) -> AppResult<GeocodeResponse> {
        let response = self
            .http
            .get(&self.settings.geocode_endpoint)
            .query(params)
            .query(&[("key", self.settings.api_key.expose_secret())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn prediction_coordinates(&self, place_id: &str) -> AppResult<Option<(f64, f64)>> {
        let response = self
            .http
            .get(&self.settings.details_endpoint)
            .query(&[
                ("place_id", place_id),
                ("fields", "geometry"),
                ("key", self.settings.api_key.expose_secret()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let details: DetailsResponse = response.json().await?;
        Ok(details
            .result
            .and_then(|r| r.geometry)
            .map(|g| (g.location.lat, g.location.lng)))
    }
}

#[async_trait]
impl GeocodeProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn forward(&self, query: &str) -> AppResult<Option<ProviderHit>> {
        let parsed = self.geocode_request(&[("address", query)]).await?;
        let Some(entry) = parsed.results.into_iter().next() else {
            return Ok(None);
        };
        let location = entry.geometry.location;
        Ok(Some(ProviderHit::bare(GeocodeResult::new(
            location.lat,
            location.lng,
            entry.formatted_address.unwrap_or_default(),
        ))))
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> AppResult<Option<ProviderHit>> {
        let latlng = format!("{latitude},{longitude}");
        let parsed = self.geocode_request(&[("latlng", latlng.as_str())]).await?;
        let Some(entry) = parsed.results.into_iter().next() else {
            return Ok(None);
        };

        let display_name = clean_reverse_name(&entry)
            .or(entry.formatted_address.clone())
            .unwrap_or_default();
        let location = entry.geometry.location;
        Ok(Some(ProviderHit::bare(GeocodeResult::new(
            location.lat,
            location.lng,
            display_name,
        ))))
    }

    async fn autocomplete(
        &self,
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<GeocodeSuggestion>> {
        let response = self
            .http
            .get(&self.settings.autocomplete_endpoint)
            .query(&[
                ("input", query),
                ("types", "geocode"),
                ("key", self.settings.api_key.expose_secret()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let parsed: AutocompleteResponse = response.json().await?;
        let mut suggestions = Vec::new();
        for prediction in parsed.predictions.into_iter().take(limit) {
            // Predictions carry no coordinates; each needs a detail fetch.
            // A failed fetch drops that one suggestion, not the whole list.
            match self.prediction_coordinates(&prediction.place_id).await {
                Ok(Some((lat, lng))) => suggestions.push(GeocodeSuggestion {
                    latitude: lat,
                    longitude: lng,
                    display_name: prediction.description,
                    kind: prediction
                        .types
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| "place".into()),
                }),
                Ok(None) => {
                    debug!(place_id = prediction.place_id, "prediction has no geometry");
                }
                Err(err) => {
                    warn!(?err, place_id = prediction.place_id, "detail fetch failed; dropping suggestion");
                }
            }
        }
        Ok(suggestions)
    }
}

/// Prefers "city, state" or "city, country" over the full formatted address.
fn clean_reverse_name(entry: &GeocodeEntry) -> Option<String> {
    let components = entry.address_components.as_deref()?;
    let find = |wanted: &str| {
        components
            .iter()
            .find(|c| c.types.iter().any(|t| t == wanted))
            .map(|c| c.long_name.clone())
    };

    let city = find("locality").or_else(|| find("postal_town"))?;
    let region = find("administrative_area_level_1").or_else(|| find("country"))?;
    Some(format!("{city}, {region}"))
}

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeEntry>,
}

#[derive(Deserialize)]
struct GeocodeEntry {
    formatted_address: Option<String>,
    geometry: Geometry,
    address_components: Option<Vec<AddressComponent>>,
}

#[derive(Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    description: String,
    place_id: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    result: Option<DetailsResult>,
}

#[derive(Deserialize)]
struct DetailsResult {
    geometry: Option<Geometry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(components: Vec<AddressComponent>) -> GeocodeEntry {
        GeocodeEntry {
            formatted_address: Some("1600 Amphitheatre Pkwy, Mountain View, CA 94043, USA".into()),
            geometry: Geometry {
                location: LatLng { lat: 0.0, lng: 0.0 },
            },
            address_components: Some(components),
        }
    }

    fn component(name: &str, kind: &str) -> AddressComponent {
        AddressComponent {
            long_name: name.into(),
            types: vec![kind.into()],
        }
    }

    #[test]
    fn reverse_name_prefers_city_and_state() {
        let entry = entry(vec![
            component("Mountain View", "locality"),
            component("California", "administrative_area_level_1"),
            component("United States", "country"),
        ]);
        assert_eq!(
            clean_reverse_name(&entry),
            Some("Mountain View, California".into())
        );
    }

    #[test]
    fn reverse_name_falls_back_to_country() {
        let entry = entry(vec![
            component("Reykjavik", "locality"),
            component("Iceland", "country"),
        ]);
        assert_eq!(clean_reverse_name(&entry), Some("Reykjavik, Iceland".into()));
    }

    #[test]
    fn reverse_name_requires_a_city() {
        let entry = entry(vec![component("California", "administrative_area_level_1")]);
        assert_eq!(clean_reverse_name(&entry), None);
    }
}
