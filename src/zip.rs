use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::errors::AppResult;
use crate::model::{GeocodeResult, GeocodeSuggestion};

const EMBEDDED_TABLE: &str = include_str!("../data/zip_codes.csv");

/// One row of the postal reference table. Read-only at runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct ZipRecord {
    pub code: String,
    pub city: String,
    pub region_code: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl ZipRecord {
    pub fn display_name(&self) -> String {
        format!("{}, {} {}", self.city, self.region_code, self.code)
    }

    pub fn to_result(&self) -> GeocodeResult {
        GeocodeResult::new(self.latitude, self.longitude, self.display_name())
    }

    pub fn to_suggestion(&self) -> GeocodeSuggestion {
        GeocodeSuggestion {
            latitude: self.latitude,
            longitude: self.longitude,
            display_name: self.display_name(),
            kind: "postcode".into(),
        }
    }
}

/// The fast-path lookup table. Postal codes found here are authoritative and
/// never fall through to cache or providers; codes that look valid but are
/// missing fall through, since the table may be incomplete.
pub struct ZipTable {
    records: HashMap<String, ZipRecord>,
}

impl ZipTable {
    pub fn embedded() -> AppResult<Self> {
        Self::from_reader(EMBEDDED_TABLE.as_bytes())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> AppResult<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = HashMap::new();
        for row in csv_reader.deserialize() {
            let record: ZipRecord = row?;
            records.insert(record.code.clone(), record);
        }
        debug!(count = records.len(), "postal reference table loaded");
        Ok(Self { records })
    }

    pub fn lookup(&self, code: &str) -> Option<&ZipRecord> {
        self.records.get(code)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Strict 5-digit shape check. Anything else skips the fast path outright.
pub fn is_zip_candidate(query: &str) -> bool {
    query.len() == 5 && query.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_five_digit_codes_only() {
        assert!(is_zip_candidate("98101"));
        assert!(is_zip_candidate("04101"));
        assert!(!is_zip_candidate("9810"));
        assert!(!is_zip_candidate("981011"));
        assert!(!is_zip_candidate("98a01"));
        assert!(!is_zip_candidate("seattle"));
        assert!(!is_zip_candidate(""));
    }

    #[test]
    fn looks_up_embedded_records() {
        let table = ZipTable::embedded().unwrap();
        assert!(!table.is_empty());

        let record = table.lookup("98101").unwrap();
        assert_eq!(record.city, "Seattle");
        assert_eq!(record.region_code, "WA");
        assert_eq!(record.display_name(), "Seattle, WA 98101");

        let result = record.to_result();
        assert!((result.latitude - 47.6114).abs() < 1e-6);

        let suggestion = record.to_suggestion();
        assert_eq!(suggestion.kind, "postcode");
    }

    #[test]
    fn missing_code_yields_none() {
        let table = ZipTable::embedded().unwrap();
        assert!(table.lookup("00000").is_none());
    }

    #[test]
    fn loads_custom_table_from_reader() {
        let csv = "code,city,region_code,region,latitude,longitude\n\
                   12345,Schenectady,NY,New York,42.8142,-73.9396\n";
        let table = ZipTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("12345").unwrap().city, "Schenectady");
    }
}
