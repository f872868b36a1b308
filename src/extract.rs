use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_script::{Script, UnicodeScript};

use crate::providers::PlaceFacts;

/// Settlement and administrative classifications that can be indexed as-is.
const PLACE_VALUES: &[&str] = &[
    "city",
    "town",
    "village",
    "hamlet",
    "borough",
    "suburb",
    "municipality",
    "district",
    "county",
    "state",
    "region",
    "province",
    "country",
    "locality",
];

/// Normalized place document destined for bulk import into the self-hosted
/// Photon index. Keyed by `id`, so repeated discovery of the same place is a
/// last-write-wins replace on import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotonDocument {
    pub id: String,
    pub kind: String,
    pub name_default: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_alt: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

pub fn is_place_level(key: Option<&str>, value: Option<&str>) -> bool {
    match (key, value) {
        (Some("place"), Some(value)) => PLACE_VALUES.contains(&value),
        (Some("boundary"), Some("administrative")) => true,
        _ => false,
    }
}

/// Turns a used public-index feature into an indexable document, or nothing.
///
/// Place-level features index directly. Anything else (a business, an
/// address) yields a document synthesized from its most specific
/// administrative sub-field, so the gap in the self-hosted index still gets
/// repaired. `query` is the original user text for forward lookups; reverse
/// lookups have none.
pub fn extract_document(query: Option<&str>, facts: &PlaceFacts) -> Option<PhotonDocument> {
    if is_place_level(
        facts.classification_key.as_deref(),
        facts.classification_value.as_deref(),
    ) {
        direct_document(query, facts)
    } else {
        synthesized_document(facts)
    }
}

fn direct_document(query: Option<&str>, facts: &PlaceFacts) -> Option<PhotonDocument> {
    let script_name = facts
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let query = query.map(str::trim).filter(|q| !q.is_empty());

    // A non-Latin script name stays searchable by keeping the user's plain
    // query as the default and the script form as the variant.
    let (name_default, name_alt) = match (script_name, query) {
        (Some(name), Some(query)) if !is_latin(name) => {
            (query.to_string(), Some(name.to_string()))
        }
        (Some(name), _) => (name.to_string(), None),
        (None, Some(query)) => (query.to_string(), None),
        (None, None) => return None,
    };

    let kind = facts
        .classification_value
        .clone()
        .unwrap_or_else(|| "place".into());
    let id = facts
        .source_id
        .clone()
        .unwrap_or_else(|| synthetic_id(&kind, &name_default, facts));

    Some(PhotonDocument {
        id,
        kind,
        name_default,
        name_alt,
        latitude: facts.latitude,
        longitude: facts.longitude,
        country_code: facts.country_code.clone(),
        state: facts.state.clone(),
        country: facts.country.clone(),
        city: facts.city.clone(),
    })
}

fn synthesized_document(facts: &PlaceFacts) -> Option<PhotonDocument> {
    // Most specific administrative sub-field wins.
    let candidates = [
        ("city", facts.city.as_deref()),
        ("county", facts.county.as_deref()),
        ("state", facts.state.as_deref()),
        ("country", facts.country.as_deref()),
    ];
    let (kind, name) = candidates
        .into_iter()
        .find_map(|(kind, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (kind, v.to_string()))
        })?;

    let (state, country) = match kind {
        "city" | "county" => (facts.state.clone(), facts.country.clone()),
        "state" => (None, facts.country.clone()),
        _ => (None, None),
    };

    Some(PhotonDocument {
        id: synthetic_id(kind, &name, facts),
        kind: kind.into(),
        name_default: name,
        name_alt: None,
        latitude: facts.latitude,
        longitude: facts.longitude,
        country_code: facts.country_code.clone(),
        state,
        country,
        city: None,
    })
}

/// Stable identifier for documents without a source id, so repeated
/// discovery of the same place replaces rather than duplicates.
fn synthetic_id(kind: &str, name: &str, facts: &PlaceFacts) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(name.to_lowercase().as_bytes());
    if let Some(country) = facts.country.as_deref() {
        hasher.update(country.to_lowercase().as_bytes());
    }
    STANDARD_NO_PAD.encode(hasher.finalize())
}

fn is_latin(name: &str) -> bool {
    name.chars().filter(|c| c.is_alphabetic()).all(|c| {
        matches!(c.script(), Script::Latin | Script::Common | Script::Inherited)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city_facts() -> PlaceFacts {
        PlaceFacts {
            source_id: Some("N12345".into()),
            classification_key: Some("place".into()),
            classification_value: Some("city".into()),
            name: Some("Gig Harbor".into()),
            state: Some("Washington".into()),
            country: Some("United States".into()),
            country_code: Some("US".into()),
            latitude: 47.33,
            longitude: -122.58,
            ..Default::default()
        }
    }

    #[test]
    fn classifies_place_level_features() {
        assert!(is_place_level(Some("place"), Some("city")));
        assert!(is_place_level(Some("place"), Some("county")));
        assert!(is_place_level(Some("boundary"), Some("administrative")));
        assert!(!is_place_level(Some("amenity"), Some("cafe")));
        assert!(!is_place_level(Some("place"), Some("house")));
        assert!(!is_place_level(None, None));
    }

    #[test]
    fn indexes_place_level_features_directly() {
        let doc = extract_document(Some("gig harbor"), &city_facts()).unwrap();
        assert_eq!(doc.id, "N12345");
        assert_eq!(doc.kind, "city");
        assert_eq!(doc.name_default, "Gig Harbor");
        assert!(doc.name_alt.is_none());
        assert_eq!(doc.country_code.as_deref(), Some("US"));
    }

    #[test]
    fn preserves_non_latin_script_names() {
        let mut facts = city_facts();
        facts.name = Some("東京".into());
        facts.country = Some("Japan".into());

        let doc = extract_document(Some("tokyo"), &facts).unwrap();
        assert_eq!(doc.name_default, "tokyo");
        assert_eq!(doc.name_alt.as_deref(), Some("東京"));
    }

    #[test]
    fn keeps_script_name_when_no_query_available() {
        let mut facts = city_facts();
        facts.name = Some("東京".into());

        let doc = extract_document(None, &facts).unwrap();
        assert_eq!(doc.name_default, "東京");
        assert!(doc.name_alt.is_none());
    }

    #[test]
    fn synthesizes_from_most_specific_sub_field() {
        let facts = PlaceFacts {
            classification_key: Some("man_made".into()),
            classification_value: Some("works".into()),
            name: Some("Tilbury Power Station".into()),
            county: Some("Essex".into()),
            country: Some("United Kingdom".into()),
            country_code: Some("GB".into()),
            latitude: 51.46,
            longitude: 0.39,
            ..Default::default()
        };

        let doc = extract_document(Some("tilbury power station"), &facts).unwrap();
        assert_eq!(doc.kind, "county");
        assert_eq!(doc.name_default, "Essex");
        assert_eq!(doc.country.as_deref(), Some("United Kingdom"));
        assert!(doc.name_alt.is_none());
    }

    #[test]
    fn city_beats_county_when_both_present() {
        let facts = PlaceFacts {
            classification_key: Some("amenity".into()),
            classification_value: Some("cafe".into()),
            city: Some("Colchester".into()),
            county: Some("Essex".into()),
            country: Some("United Kingdom".into()),
            latitude: 51.88,
            longitude: 0.9,
            ..Default::default()
        };

        let doc = extract_document(None, &facts).unwrap();
        assert_eq!(doc.kind, "city");
        assert_eq!(doc.name_default, "Colchester");
    }

    #[test]
    fn nothing_extractable_yields_no_document() {
        let facts = PlaceFacts {
            classification_key: Some("amenity".into()),
            classification_value: Some("cafe".into()),
            name: Some("Some Cafe".into()),
            latitude: 1.0,
            longitude: 2.0,
            ..Default::default()
        };
        assert!(extract_document(Some("some cafe"), &facts).is_none());
    }

    #[test]
    fn synthetic_ids_are_stable_across_discoveries() {
        let facts = PlaceFacts {
            county: Some("Essex".into()),
            country: Some("United Kingdom".into()),
            latitude: 51.46,
            longitude: 0.39,
            ..Default::default()
        };
        let first = extract_document(None, &facts).unwrap();

        let mut moved = facts.clone();
        moved.latitude = 51.47;
        let second = extract_document(None, &moved).unwrap();
        assert_eq!(first.id, second.id);
    }
}
