use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::AppResult;
use crate::extract::is_place_level;
use crate::model::{GeocodeResult, GeocodeSuggestion};
use crate::providers::{GeocodeProvider, PlaceFacts, ProviderHit};

const HTTP_TIMEOUT_SECS: u64 = 10;

/// Adapter for a Photon place-search index. The self-hosted and public
/// deployments speak the same API, so both are instances of this type
/// pointed at different base URLs.
pub struct PhotonProvider {
    http: Client,
    label: &'static str,
    search_endpoint: String,
    reverse_endpoint: String,
}

impl PhotonProvider {
    pub fn new(base_url: &str, label: &'static str) -> AppResult<Self> {
        let base = base_url.trim_end_matches('/');
        let http = Client::builder()
            .user_agent(concat!("geocascade/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            label,
            search_endpoint: format!("{base}/api"),
            reverse_endpoint: format!("{base}/reverse"),
        })
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<PhotonFeature>> {
        let limit = limit.to_string();
        let response = self
            .http
            .get(&self.search_endpoint)
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let collection: FeatureCollection = response.json().await?;
        Ok(collection.features)
    }
}

#[async_trait]
impl GeocodeProvider for PhotonProvider {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn forward(&self, query: &str) -> AppResult<Option<ProviderHit>> {
        let features = self.search(query, 1).await?;
        Ok(features.into_iter().next().map(feature_to_hit))
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> AppResult<Option<ProviderHit>> {
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let response = self
            .http
            .get(&self.reverse_endpoint)
            .query(&[("lat", lat.as_str()), ("lon", lon.as_str()), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?;
        let collection: FeatureCollection = response.json().await?;
        Ok(collection.features.into_iter().next().map(feature_to_hit))
    }

    async fn autocomplete(
        &self,
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<GeocodeSuggestion>> {
        // Autocomplete only ever runs against the self-hosted index, and only
        // settlement/administrative features make useful suggestions there.
        let features = self.search(query, limit).await?;
        Ok(features
            .into_iter()
            .filter(|f| {
                is_place_level(
                    f.properties.osm_key.as_deref(),
                    f.properties.osm_value.as_deref(),
                )
            })
            .map(|f| {
                let (longitude, latitude) = f.geometry.lon_lat();
                GeocodeSuggestion {
                    latitude,
                    longitude,
                    display_name: display_name(&f.properties),
                    kind: suggestion_kind(&f.properties),
                }
            })
            .collect())
    }
}

fn feature_to_hit(feature: PhotonFeature) -> ProviderHit {
    let (longitude, latitude) = feature.geometry.lon_lat();
    let props = feature.properties;
    let result = GeocodeResult::new(latitude, longitude, display_name(&props));
    let place = PlaceFacts {
        source_id: props
            .osm_id
            .map(|id| format!("{}{id}", props.osm_type.as_deref().unwrap_or(""))),
        classification_key: props.osm_key,
        classification_value: props.osm_value,
        name: props.name,
        city: props.city,
        county: props.county,
        state: props.state,
        country: props.country,
        country_code: props.countrycode,
        latitude,
        longitude,
    };
    ProviderHit {
        result,
        place: Some(place),
    }
}

/// Joins the non-empty name/city/state/country fields with commas, skipping
/// segments that exactly repeat an earlier one (a city named after its state,
/// a name equal to its city, and so on).
fn display_name(props: &PhotonProperties) -> String {
    let mut segments: Vec<&str> = Vec::with_capacity(4);
    for candidate in [
        props.name.as_deref(),
        props.city.as_deref(),
        props.state.as_deref(),
        props.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        let candidate = candidate.trim();
        if !candidate.is_empty() && !segments.contains(&candidate) {
            segments.push(candidate);
        }
    }
    segments.join(", ")
}

fn suggestion_kind(props: &PhotonProperties) -> String {
    props
        .kind
        .clone()
        .or_else(|| props.osm_value.clone())
        .unwrap_or_else(|| "place".into())
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<PhotonFeature>,
}

#[derive(Deserialize)]
struct PhotonFeature {
    geometry: PhotonGeometry,
    properties: PhotonProperties,
}

#[derive(Deserialize)]
struct PhotonGeometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

impl PhotonGeometry {
    fn lon_lat(&self) -> (f64, f64) {
        let lon = self.coordinates.first().copied().unwrap_or_default();
        let lat = self.coordinates.get(1).copied().unwrap_or_default();
        (lon, lat)
    }
}

#[derive(Deserialize, Default)]
struct PhotonProperties {
    osm_id: Option<i64>,
    osm_type: Option<String>,
    osm_key: Option<String>,
    osm_value: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    city: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
    countrycode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_joins_non_empty_fields() {
        let props = PhotonProperties {
            name: Some("Pike Place Market".into()),
            city: Some("Seattle".into()),
            state: Some("Washington".into()),
            country: Some("United States".into()),
            ..Default::default()
        };
        assert_eq!(
            display_name(&props),
            "Pike Place Market, Seattle, Washington, United States"
        );
    }

    #[test]
    fn display_name_removes_duplicate_segments() {
        // A city feature repeats its own name in the city field.
        let props = PhotonProperties {
            name: Some("New York".into()),
            city: Some("New York".into()),
            state: Some("New York".into()),
            country: Some("United States".into()),
            ..Default::default()
        };
        assert_eq!(display_name(&props), "New York, United States");
    }

    #[test]
    fn display_name_skips_blank_fields() {
        let props = PhotonProperties {
            name: Some("Berlin".into()),
            city: None,
            state: Some("  ".into()),
            country: Some("Germany".into()),
            ..Default::default()
        };
        assert_eq!(display_name(&props), "Berlin, Germany");
    }

    #[test]
    fn suggestion_kind_prefers_type_tag() {
        let props = PhotonProperties {
            kind: Some("city".into()),
            osm_value: Some("town".into()),
            ..Default::default()
        };
        assert_eq!(suggestion_kind(&props), "city");

        let fallback = PhotonProperties {
            osm_value: Some("village".into()),
            ..Default::default()
        };
        assert_eq!(suggestion_kind(&fallback), "village");
    }
}
