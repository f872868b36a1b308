use serde::{Deserialize, Serialize};

/// Canonical answer for a forward or reverse geocode. Immutable once built;
/// `display_name` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

impl GeocodeResult {
    pub fn new(latitude: f64, longitude: f64, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let display_name = if display_name.trim().is_empty() {
            format!("{latitude:.5}, {longitude:.5}")
        } else {
            display_name
        };
        Self {
            latitude,
            longitude,
            display_name,
        }
    }
}

/// One autocomplete candidate. `kind` is a coarse category tag such as
/// "city", "postcode", or "place".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeSuggestion {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
    pub kind: String,
}

/// Cache and ZIP lookups key off this form. Lossy on purpose: distinct raw
/// strings may collapse to one entry, so it must be applied on both read and
/// write.
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}
