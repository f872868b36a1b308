mod audit;
mod cache;
mod config;
mod db;
mod errors;
mod extract;
mod google;
mod indexer;
mod model;
mod photon;
mod providers;
mod resolver;
mod zip;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rusqlite::Connection as SqlConnection;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::audit::AuditLog;
pub use crate::cache::GeocodeCache;
pub use crate::config::{AppConfig, PublicAppConfig};
pub use crate::db::bootstrap;
pub use crate::errors::{AppError, AppResult};
pub use crate::extract::{extract_document, is_place_level, PhotonDocument};
pub use crate::google::GoogleProvider;
pub use crate::indexer::{pending_count, IndexWriter};
pub use crate::model::{normalize_query, GeocodeResult, GeocodeSuggestion};
pub use crate::photon::PhotonProvider;
pub use crate::providers::{GeocodeProvider, PlaceFacts, ProviderHit};
pub use crate::resolver::{dedup_suggestions, is_non_domestic, Resolver, ResolverOptions};
pub use crate::zip::{is_zip_candidate, ZipRecord, ZipTable};

/// Everything the resolution engine owns: the orchestrator plus the shared
/// database handle behind it. The HTTP layer above holds one of these and
/// calls `resolve`/`suggest`/`resolve_reverse`.
pub struct GeocoderService {
    resolver: Resolver,
    config: AppConfig,
    db: Arc<Mutex<SqlConnection>>,
    db_path: PathBuf,
    audit: AuditLog,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub db_path: String,
    pub audit_buffer_path: String,
    pub audit_queue_depth: usize,
    pub index_queue_depth: usize,
    pub config: PublicAppConfig,
}

impl GeocoderService {
    /// Wires config, database, providers, indexing queue, and audit log.
    /// Must run inside a tokio runtime (the queue drain task is spawned
    /// here). Missing primary credentials skip that provider.
    pub fn initialize<P: AsRef<Path>>(data_dir: P, config: AppConfig) -> AppResult<Self> {
        let data_dir = data_dir.as_ref();
        let context = bootstrap(data_dir, &config.database_file_name)?;
        let db = Arc::new(Mutex::new(context.connection));
        let db_path = context.path;

        let zip = match &config.zip_table_path {
            Some(path) => ZipTable::from_file(path)?,
            None => ZipTable::embedded()?,
        };

        let primary = GoogleProvider::maybe_new(&config)?
            .map(|p| Arc::new(p) as Arc<dyn GeocodeProvider>);
        let self_hosted: Arc<dyn GeocodeProvider> =
            Arc::new(PhotonProvider::new(&config.photon_local_url, "photon-local")?);
        let public_fallback: Arc<dyn GeocodeProvider> =
            Arc::new(PhotonProvider::new(&config.photon_public_url, "photon-public")?);

        let cache = GeocodeCache::new(Arc::clone(&db));
        let indexer = IndexWriter::spawn(Arc::clone(&db), config.index_queue_capacity);
        let audit = AuditLog::new(data_dir, &config)?;

        let resolver = Resolver::new(
            ResolverOptions {
                self_hosted_enabled: config.self_hosted_photon_enabled,
            },
            zip,
            cache,
            primary,
            self_hosted,
            public_fallback,
            indexer,
            audit.clone(),
        );

        Ok(Self {
            resolver,
            config,
            db,
            db_path,
            audit,
        })
    }

    pub async fn resolve(&self, query: &str) -> Option<GeocodeResult> {
        self.resolver.resolve(query).await
    }

    pub async fn resolve_reverse(&self, latitude: f64, longitude: f64) -> Option<GeocodeResult> {
        self.resolver.resolve_reverse(latitude, longitude).await
    }

    pub async fn suggest(&self, query: &str, limit: usize) -> Vec<GeocodeSuggestion> {
        self.resolver.suggest(query, limit).await
    }

    pub fn health(&self) -> AppResult<ServiceHealth> {
        Ok(ServiceHealth {
            db_path: self.db_path.to_string_lossy().to_string(),
            audit_buffer_path: self.audit.buffer_path().to_string_lossy().to_string(),
            audit_queue_depth: self.audit.queue_depth(),
            index_queue_depth: pending_count(&self.db)?,
            config: self.config.public_profile(),
        })
    }

    pub fn flush_audit(&self) -> AppResult<()> {
        self.audit.flush()
    }
}

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,geocascade=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
