//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OUTPOST_*)
//! 2. TOML config file (if OUTPOST_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

use crate::Error;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OUTPOST_*)
/// 2. TOML config file (if OUTPOST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the application is served from (scheme + host + port).
    ///
    /// Set via OUTPOST_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Version label of the current store generation. Bump it to ship a
    /// new asset set; prior generations are deleted at activation.
    ///
    /// Set via OUTPOST_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Seed asset list populated into the generation at install time.
    /// Relative members resolve against the origin and are mandatory as a
    /// unit; absolute cross-origin members are best-effort.
    #[serde(default = "default_seed_assets")]
    pub seed_assets: Vec<String>,

    /// File name of the application's entry document.
    #[serde(default = "default_entry_document")]
    pub entry_document: String,

    /// File name of the application manifest.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Whether entry-document fetches force end-to-end revalidation
    /// (bypassing intermediate HTTP caches) instead of a plain refresh.
    #[serde(default = "default_true")]
    pub revalidate_shell: bool,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via OUTPOST_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via OUTPOST_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via OUTPOST_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Path to the SQLite store database.
    ///
    /// Set via OUTPOST_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_generation() -> String {
    "outpost-v1".into()
}

fn default_seed_assets() -> Vec<String> {
    vec![
        "./".into(),
        "index.html".into(),
        "manifest.json".into(),
        "icon-192.png".into(),
        "icon-512.png".into(),
    ]
}

fn default_entry_document() -> String {
    "index.html".into()
}

fn default_manifest() -> String {
    "manifest.json".into()
}

fn default_user_agent() -> String {
    "outpost/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./outpost-store.sqlite")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            generation: default_generation(),
            seed_assets: default_seed_assets(),
            entry_document: default_entry_document(),
            manifest: default_manifest(),
            revalidate_shell: true,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            db_path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured origin as a parsed URL.
    pub fn origin_url(&self) -> Result<Url, Error> {
        Url::parse(&self.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.origin)))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OUTPOST_`
    /// 2. TOML file from `OUTPOST_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OUTPOST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OUTPOST_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
