use async_trait::async_trait;

use crate::errors::AppResult;
use crate::model::{GeocodeResult, GeocodeSuggestion};

/// A successful provider response: the canonical result plus whatever
/// place-identifying facts the backend exposed. Only the Photon adapters
/// populate `place`; the orchestrator uses it to feed the indexing pipeline.
#[derive(Debug, Clone)]
pub struct ProviderHit {
    pub result: GeocodeResult,
    pub place: Option<PlaceFacts>,
}

impl ProviderHit {
    pub fn bare(result: GeocodeResult) -> Self {
        Self {
            result,
            place: None,
        }
    }
}

/// Raw classification and administrative sub-fields of a provider feature,
/// as needed by place extraction.
#[derive(Debug, Clone, Default)]
pub struct PlaceFacts {
    pub source_id: Option<String>,
    pub classification_key: Option<String>,
    pub classification_value: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// The single capability interface every backend adapter implements. The
/// orchestrator iterates adapters in precedence order and treats an `Err`
/// exactly like `Ok(None)`: advance the cascade, never abort the request.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn forward(&self, query: &str) -> AppResult<Option<ProviderHit>>;

    async fn reverse(&self, latitude: f64, longitude: f64) -> AppResult<Option<ProviderHit>>;

    async fn autocomplete(&self, query: &str, limit: usize)
        -> AppResult<Vec<GeocodeSuggestion>>;
}
