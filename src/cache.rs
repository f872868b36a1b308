use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use tracing::{trace, warn};

use crate::errors::AppResult;
use crate::model::GeocodeResult;

/// Persistent normalized-query -> result store. Entries never expire; writes
/// are unconditional upserts, so concurrent writers resolve to last-write-wins.
/// Any storage error degrades to a miss rather than failing the caller.
#[derive(Clone)]
pub struct GeocodeCache {
    db: Arc<Mutex<Connection>>,
}

impl GeocodeCache {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    pub fn get(&self, normalized_query: &str) -> Option<GeocodeResult> {
        match self.try_get(normalized_query) {
            Ok(hit) => hit,
            Err(err) => {
                warn!(?err, query = normalized_query, "cache read failed; treating as miss");
                None
            }
        }
    }

    pub fn put(&self, normalized_query: &str, result: &GeocodeResult) {
        if let Err(err) = self.try_put(normalized_query, result) {
            warn!(?err, query = normalized_query, "cache write failed; dropping entry");
        } else {
            trace!(query = normalized_query, "geocode result cached");
        }
    }

    fn try_get(&self, normalized_query: &str) -> AppResult<Option<GeocodeResult>> {
        let conn = self.db.lock();
        conn.query_row(
            "SELECT lat, lon, display_name FROM geocode_cache WHERE query = ?1",
            [normalized_query],
            |row| {
                Ok(GeocodeResult {
                    latitude: row.get(0)?,
                    longitude: row.get(1)?,
                    display_name: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    fn try_put(&self, normalized_query: &str, result: &GeocodeResult) -> AppResult<()> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO geocode_cache (query, lat, lon, display_name, created_at)
            VALUES (?1, ?2, ?3, ?4, DATETIME('now'))
            ON CONFLICT(query) DO UPDATE SET
                lat = excluded.lat,
                lon = excluded.lon,
                display_name = excluded.display_name,
                created_at = DATETIME('now')",
            (
                normalized_query,
                result.latitude,
                result.longitude,
                result.display_name.as_str(),
            ),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::bootstrap;
    use tempfile::tempdir;

    fn test_cache() -> (tempfile::TempDir, GeocodeCache) {
        let dir = tempdir().unwrap();
        let ctx = bootstrap(dir.path(), "cache.db").unwrap();
        let cache = GeocodeCache::new(Arc::new(Mutex::new(ctx.connection)));
        (dir, cache)
    }

    #[test]
    fn round_trips_results() {
        let (_dir, cache) = test_cache();
        assert!(cache.get("seattle").is_none());

        let result = GeocodeResult::new(47.6, -122.3, "Seattle, WA, USA");
        cache.put("seattle", &result);
        assert_eq!(cache.get("seattle"), Some(result));
    }

    #[test]
    fn upsert_is_last_write_wins() {
        let (_dir, cache) = test_cache();
        cache.put("pdx", &GeocodeResult::new(1.0, 2.0, "First"));
        cache.put("pdx", &GeocodeResult::new(45.5, -122.6, "Portland, OR, USA"));

        let hit = cache.get("pdx").unwrap();
        assert_eq!(hit.display_name, "Portland, OR, USA");
        assert!((hit.latitude - 45.5).abs() < 1e-9);
    }

    #[test]
    fn unavailable_store_degrades_to_miss() {
        let dir = tempdir().unwrap();
        // A connection with no schema: every query errors, none propagate.
        let conn = Connection::open(dir.path().join("empty.db")).unwrap();
        let cache = GeocodeCache::new(Arc::new(Mutex::new(conn)));

        assert!(cache.get("anything").is_none());
        cache.put("anything", &GeocodeResult::new(0.0, 0.0, "x"));
        assert!(cache.get("anything").is_none());
    }
}
