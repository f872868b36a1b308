use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

const DEFAULT_AUDIT_BUFFER_MAX_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_AUDIT_BUFFER_MAX_FILES: usize = 5;
const DEFAULT_INDEX_QUEUE_CAPACITY: usize = 256;
const DEFAULT_PHOTON_PUBLIC_URL: &str = "https://photon.komoot.io";
const DEFAULT_PHOTON_LOCAL_URL: &str = "http://127.0.0.1:2322";
const DEFAULT_GOOGLE_API_BASE: &str = "https://maps.googleapis.com";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub google_api_key: Option<SecretString>,
    pub google_api_base: String,
    pub photon_local_url: String,
    pub photon_public_url: String,
    pub self_hosted_photon_enabled: bool,
    pub database_file_name: String,
    pub zip_table_path: Option<String>,
    pub index_queue_capacity: usize,
    pub audit_batch_size: usize,
    pub audit_buffer_max_bytes: u64,
    pub audit_buffer_max_files: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub has_google_api_key: bool,
    pub google_api_base: String,
    pub photon_local_url: String,
    pub photon_public_url: String,
    pub self_hosted_photon_enabled: bool,
    pub database_file_name: String,
    pub zip_table_path: Option<String>,
    pub index_queue_capacity: usize,
    pub audit_batch_size: usize,
    pub audit_buffer_max_bytes: u64,
    pub audit_buffer_max_files: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            google_api_key: env::var("GOOGLE_GEOCODING_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            google_api_base: trimmed_url("GOOGLE_API_BASE", DEFAULT_GOOGLE_API_BASE),
            photon_local_url: trimmed_url("PHOTON_LOCAL_URL", DEFAULT_PHOTON_LOCAL_URL),
            photon_public_url: trimmed_url("PHOTON_PUBLIC_URL", DEFAULT_PHOTON_PUBLIC_URL),
            self_hosted_photon_enabled: parse_bool("SELF_HOSTED_PHOTON_ENABLED", false),
            database_file_name: env::var("DATABASE_FILE_NAME")
                .unwrap_or_else(|_| "geocascade.db".to_string()),
            zip_table_path: env::var("ZIP_TABLE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            index_queue_capacity: parse_usize("INDEX_QUEUE_CAPACITY", DEFAULT_INDEX_QUEUE_CAPACITY)
                .max(1),
            audit_batch_size: parse_usize("AUDIT_BATCH_SIZE", 25).max(1),
            audit_buffer_max_bytes: parse_u64(
                "AUDIT_BUFFER_MAX_BYTES",
                DEFAULT_AUDIT_BUFFER_MAX_BYTES,
            ),
            audit_buffer_max_files: parse_usize(
                "AUDIT_BUFFER_MAX_FILES",
                DEFAULT_AUDIT_BUFFER_MAX_FILES,
            )
            .max(1),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            has_google_api_key: self.google_api_key.is_some(),
            google_api_base: self.google_api_base.clone(),
            photon_local_url: self.photon_local_url.clone(),
            photon_public_url: self.photon_public_url.clone(),
            self_hosted_photon_enabled: self.self_hosted_photon_enabled,
            database_file_name: self.database_file_name.clone(),
            zip_table_path: self.zip_table_path.clone(),
            index_queue_capacity: self.index_queue_capacity,
            audit_batch_size: self.audit_batch_size,
            audit_buffer_max_bytes: self.audit_buffer_max_bytes,
            audit_buffer_max_files: self.audit_buffer_max_files,
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn trimmed_url(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}
