//! Service configuration.

use std::path::PathBuf;

use crate::cache::FileCacheConfig;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory (default: "/data/squish").
    pub data_dir: String,

    /// Directory where uploaded bytes are spooled while cached
    /// (default: "/data/squish-spool").
    pub spool_dir: PathBuf,

    /// HS256 secret for dashboard JWT validation. Bearer auth is refused
    /// when unset.
    pub jwt_secret: Option<String>,

    /// Admin API key for key provisioning.
    pub admin_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes (uploads included).
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// File cache tuning.
    pub file_cache: FileCacheConfig,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = FileCacheConfig::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/squish".into()),
            spool_dir: std::env::var("SPOOL_DIR")
                .unwrap_or_else(|_| "/data/squish-spool".into())
                .into(),
            jwt_secret: std::env::var("JWT_SECRET").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", 25 * 1024 * 1024),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS", 30),
            file_cache: FileCacheConfig {
                ttl_seconds: env_parse("FILE_CACHE_TTL_SECONDS", defaults.ttl_seconds),
                max_entries: env_parse("FILE_CACHE_MAX_ENTRIES", defaults.max_entries),
                sweep_seconds: env_parse("FILE_CACHE_SWEEP_SECONDS", defaults.sweep_seconds),
            },
        }
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/squish".into(),
            spool_dir: "/data/squish-spool".into(),
            jwt_secret: None,
            admin_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 25 * 1024 * 1024,
            request_timeout_seconds: 30,
            file_cache: FileCacheConfig::default(),
        }
    }
}
