//! Configuration module for cloudbox.

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::quota::{MAX_FILE_SIZE, STORAGE_LIMIT};
use crate::{CloudboxError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins. Empty means any origin without credentials.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Maximum request body size in megabytes.
    ///
    /// Uploads travel as base64 inside JSON, so this has to be roughly a
    /// third larger than the biggest file that should be accepted.
    #[serde(default = "default_max_body_size")]
    pub max_body_size_mb: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_size() -> usize {
    512
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            max_body_size_mb: default_max_body_size(),
        }
    }
}

/// Persistence backend behind the file store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Everything kept in process memory; lost on restart.
    Memory,
    /// JSON metadata index plus one blob file per stored file.
    #[default]
    File,
    /// SQLite database holding metadata and content.
    Sqlite,
}

impl StorageBackend {
    /// Name used in configuration files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::File => "file",
            StorageBackend::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "sqlite" => Ok(StorageBackend::Sqlite),
            _ => Err(format!("unknown storage backend: {s}")),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Which backend to open at startup.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory for the `file` backend (index, user index and blobs).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Database file for the `sqlite` backend.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_data_dir() -> String {
    "data/files".to_string()
}

fn default_database_path() -> String {
    "data/cloudbox.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
            database_path: default_database_path(),
        }
    }
}

/// Quota configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Largest single file accepted, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    /// Ceiling on the sum of all file sizes, in bytes.
    #[serde(default = "default_storage_limit")]
    pub storage_limit_bytes: u64,
}

fn default_max_file_size() -> u64 {
    MAX_FILE_SIZE
}

fn default_storage_limit() -> u64 {
    STORAGE_LIMIT
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            storage_limit_bytes: default_storage_limit(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Whether file routes require a logged-in user.
    #[serde(default)]
    pub enabled: bool,
    /// JWT secret key (must be set if enabled).
    #[serde(default)]
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,
    /// Rate limit for login and registration (requests per minute per IP).
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
}

fn default_token_expiry() -> u64 {
    24 * 60 * 60
}

fn default_login_rate_limit() -> u32 {
    10
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: String::new(),
            token_expiry_secs: default_token_expiry(),
            login_rate_limit: default_login_rate_limit(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty disables file logging.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/cloudbox.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Quota limits.
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(CloudboxError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CloudboxError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CLOUDBOX_JWT_SECRET`: JWT secret key
    /// - `CLOUDBOX_STORAGE_BACKEND`: `memory`, `file` or `sqlite`
    /// - `CLOUDBOX_DATA_DIR`: data directory of the `file` backend
    ///
    /// Empty or unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(secret) = non_empty_env("CLOUDBOX_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Some(backend) = non_empty_env("CLOUDBOX_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(backend) => self.storage.backend = backend,
                Err(e) => tracing::warn!("Ignoring CLOUDBOX_STORAGE_BACKEND: {}", e),
            }
        }

        if let Some(dir) = non_empty_env("CLOUDBOX_DATA_DIR") {
            self.storage.data_dir = dir;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - authentication is enabled but the JWT secret is not set
    /// - either quota limit is zero
    pub fn validate(&self) -> Result<()> {
        if self.auth.enabled && self.auth.jwt_secret.is_empty() {
            return Err(CloudboxError::Config(
                "auth is enabled but jwt_secret is not set. \
                 Set it in config.toml or via CLOUDBOX_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.quota.max_file_size_bytes == 0 || self.quota.storage_limit_bytes == 0 {
            return Err(CloudboxError::Config(
                "quota limits must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.server.max_body_size_mb, 512);

        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.data_dir, "data/files");
        assert_eq!(config.storage.database_path, "data/cloudbox.db");

        assert_eq!(config.quota.max_file_size_bytes, 100 * 1024 * 1024 * 1024);
        assert_eq!(config.quota.storage_limit_bytes, 100 * 1024 * 1024 * 1024);

        assert!(!config.auth.enabled);
        assert!(config.auth.jwt_secret.is_empty());
        assert_eq!(config.auth.token_expiry_secs, 86400);
        assert_eq!(config.auth.login_rate_limit, 10);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/cloudbox.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 8080
cors_origins = ["http://localhost:5173"]
max_body_size_mb = 64

[storage]
backend = "sqlite"
data_dir = "/srv/cloudbox/files"
database_path = "/srv/cloudbox/db.sqlite"

[quota]
max_file_size_bytes = 1048576
storage_limit_bytes = 10485760

[auth]
enabled = true
jwt_secret = "s3cret"
token_expiry_secs = 3600
login_rate_limit = 3

[logging]
level = "debug"
file = ""
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.server.max_body_size_mb, 64);

        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.data_dir, "/srv/cloudbox/files");
        assert_eq!(config.storage.database_path, "/srv/cloudbox/db.sqlite");

        assert_eq!(config.quota.max_file_size_bytes, 1048576);
        assert_eq!(config.quota.storage_limit_bytes, 10485760);

        assert!(config.auth.enabled);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.token_expiry_secs, 3600);
        assert_eq!(config.auth.login_rate_limit, 3);

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_empty());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[storage]
backend = "memory"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.data_dir, "data/files");
        assert_eq!(config.server.port, 5000);
        assert!(!config.auth.enabled);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        if let Err(CloudboxError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_parse_unknown_backend() {
        let result = Config::parse("[storage]\nbackend = \"s3\"\n");
        assert!(matches!(result, Err(CloudboxError::Config(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent-cloudbox.toml");
        assert!(matches!(result, Err(CloudboxError::Io(_))));
    }

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!("FILE".parse::<StorageBackend>(), Ok(StorageBackend::File));
        assert_eq!("Sqlite".parse::<StorageBackend>(), Ok(StorageBackend::Sqlite));
        assert!("postgres".parse::<StorageBackend>().is_err());
        assert_eq!(StorageBackend::Sqlite.to_string(), "sqlite");
    }

    #[test]
    fn test_apply_env_overrides() {
        std::env::set_var("CLOUDBOX_JWT_SECRET", "env-secret-key");
        std::env::set_var("CLOUDBOX_STORAGE_BACKEND", "memory");
        std::env::set_var("CLOUDBOX_DATA_DIR", "");

        let mut config = Config::default();
        config.storage.data_dir = "original".to_string();
        config.apply_env_overrides();

        assert_eq!(config.auth.jwt_secret, "env-secret-key");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        // Empty values never override
        assert_eq!(config.storage.data_dir, "original");

        std::env::remove_var("CLOUDBOX_JWT_SECRET");
        std::env::remove_var("CLOUDBOX_STORAGE_BACKEND");
        std::env::remove_var("CLOUDBOX_DATA_DIR");
    }

    #[test]
    fn test_validate_auth_enabled_no_secret() {
        let mut config = Config::default();
        config.auth.enabled = true;

        let result = config.validate();
        if let Err(CloudboxError::Config(msg)) = result {
            assert!(msg.contains("jwt_secret"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_validate_auth_enabled_with_secret() {
        let mut config = Config::default();
        config.auth.enabled = true;
        config.auth.jwt_secret = "secret".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_quota() {
        let mut config = Config::default();
        config.quota.storage_limit_bytes = 0;

        assert!(matches!(config.validate(), Err(CloudboxError::Config(_))));
    }

    #[test]
    fn test_validate_defaults() {
        assert!(Config::default().validate().is_ok());
    }
}
