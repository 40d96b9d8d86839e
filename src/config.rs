//! Configuration management for therapy-sync.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::{ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::cli::Args;
use crate::ids::UserId;
use crate::media::MediaConfig;
use crate::security::TokenStore;
use crate::session::GovernorConfig;

/// Longest accepted media retention (100 years).
pub const MAX_RETENTION_DAYS: u64 = 36_500;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// Live state policy.
    pub sync: SyncSection,
    /// Media commit settings.
    pub media: MediaSection,
    /// Repository seed data.
    pub repository: RepositorySection,
    /// Bearer tokens.
    pub auth: AuthSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable graceful shutdown.
    pub graceful_shutdown: bool,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            graceful_shutdown: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Live state section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Minimum milliseconds between two accepted exercise changes.
    pub min_transition_interval_ms: u64,
    /// Evict live entries idle for this many seconds.
    pub state_retention_secs: u64,
    /// Seconds between eviction sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            min_transition_interval_ms: 6_000,
            state_retention_secs: 24 * 60 * 60,
            sweep_interval_secs: 300,
        }
    }
}

/// Media section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSection {
    /// Days a committed video stays valid.
    pub retention_days: u64,
    /// Directory uploaded objects are written to.
    pub storage_dir: PathBuf,
    /// Base URL locators are built from.
    pub public_base_url: String,
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            retention_days: 30,
            storage_dir: PathBuf::from("media"),
            public_base_url: "http://127.0.0.1:3000/media".to_string(),
        }
    }
}

/// Repository section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySection {
    /// JSON fixture with sessions and exercise-in-session rows.
    pub fixture: Option<PathBuf>,
}

/// Authentication section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Token → user id.
    pub tokens: HashMap<String, u64>,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("THERAPY_SYNC_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("THERAPY_SYNC_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(path) = std::env::var("THERAPY_SYNC_FIXTURE") {
            if !path.is_empty() {
                self.repository.fixture = Some(PathBuf::from(path));
            }
        }

        if let Ok(dir) = std::env::var("THERAPY_SYNC_STORAGE_DIR") {
            if !dir.is_empty() {
                self.media.storage_dir = PathBuf::from(dir);
            }
        }

        if let Ok(level) = std::env::var("THERAPY_SYNC_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref fixture) = args.fixture {
            self.repository.fixture = Some(fixture.clone());
        }
        if let Some(ref dir) = args.storage_dir {
            self.media.storage_dir = dir.clone();
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        if self.sync.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "sync.sweep_interval_secs",
                "must be greater than zero".into(),
            ));
        }

        // Unusable media settings fail at startup, not on the first upload.
        self.media_config()?;

        let mut server_config = ServerConfig::new(host.to_string(), self.server.port)
            .with_max_upload_bytes(self.server.max_upload_bytes)
            .with_state_retention(
                Duration::from_secs(self.sync.state_retention_secs),
                Duration::from_secs(self.sync.sweep_interval_secs),
            );

        if !self.server.graceful_shutdown {
            server_config = server_config.without_graceful_shutdown();
        }

        Ok(server_config)
    }

    /// Transition governor settings.
    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            min_transition_interval: Duration::from_millis(self.sync.min_transition_interval_ms),
        }
    }

    /// Media commit settings.
    pub fn media_config(&self) -> Result<MediaConfig, ConfigError> {
        let days = self.media.retention_days;
        if days == 0 || days > MAX_RETENTION_DAYS {
            return Err(ConfigError::InvalidValue(
                "media.retention_days",
                format!("must be between 1 and {MAX_RETENTION_DAYS}"),
            ));
        }

        let secs = days.checked_mul(24 * 60 * 60).ok_or_else(|| {
            ConfigError::InvalidValue("media.retention_days", "out of range".into())
        })?;
        Ok(MediaConfig {
            retention: Duration::from_secs(secs),
        })
    }

    /// Token store populated from the auth section.
    pub fn token_store(&self) -> TokenStore {
        TokenStore::from_tokens(
            self.auth
                .tokens
                .iter()
                .map(|(token, user)| (token.clone(), UserId::from_raw(*user))),
        )
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// A setting has an unusable value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidValue(key, reason) => write!(f, "invalid value for {}: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.sync.min_transition_interval_ms, 6_000);
        assert_eq!(config.media.retention_days, 30);
        assert!(config.repository.fixture.is_none());
        assert!(config.auth.tokens.is_empty());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "server": {
                "host": "0.0.0.0",
                "port": 8080
            },
            "sync": {
                "min_transition_interval_ms": 2500
            },
            "auth": {
                "tokens": {"tok-pro": 20, "tok-patient": 10}
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.governor_config().min_transition_interval,
            Duration::from_millis(2500)
        );

        let tokens = config.token_store();
        assert_eq!(tokens.count(), 2);
        assert_eq!(tokens.resolve("tok-pro"), Some(UserId::from_raw(20)));
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{
            "server": {
                "port": 9000
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1"); // Default
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.sync.sweep_interval_secs, 300);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            host: Some("192.168.1.1".parse().unwrap()),
            port: Some(5000),
            fixture: Some(PathBuf::from("/srv/fixture.json")),
            storage_dir: Some(PathBuf::from("/srv/media")),
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(
            config.repository.fixture,
            Some(PathBuf::from("/srv/fixture.json"))
        );
        assert_eq!(config.media.storage_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_apply_args_keeps_file_values_when_unset() {
        let mut config = Config::default();
        config.server.port = 9999;

        config.apply_args(&Args::default());
        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn test_to_server_config() {
        let config = Config::default();
        let server_config = config.to_server_config().unwrap();

        assert_eq!(server_config.host, "127.0.0.1");
        assert_eq!(server_config.port, 3000);
        assert_eq!(server_config.sweep_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_host() {
        let mut config = Config::default();
        config.server.host = "not-an-ip".to_string();

        let result = config.to_server_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let mut config = Config::default();
        config.sync.sweep_interval_secs = 0;

        let err = config.to_server_config().unwrap_err();
        assert!(err.to_string().contains("sweep_interval_secs"));
    }

    #[test]
    fn test_media_config_retention() {
        let config = Config::default();
        assert_eq!(
            config.media_config().unwrap().retention,
            Duration::from_secs(30 * 24 * 60 * 60)
        );
    }

    #[test]
    fn test_out_of_range_retention_rejected() {
        let mut config = Config::default();

        config.media.retention_days = 100_000_000;
        let err = config.media_config().unwrap_err();
        assert!(err.to_string().contains("retention_days"));

        config.media.retention_days = u64::MAX;
        assert!(config.media_config().is_err());

        config.media.retention_days = 0;
        assert!(config.media_config().is_err());

        config.media.retention_days = MAX_RETENTION_DAYS;
        assert!(config.media_config().is_ok());
    }

    #[test]
    fn test_server_config_rejects_bad_retention() {
        let mut config = Config::default();
        config.media.retention_days = 100_000_000;

        let err = config.to_server_config().unwrap_err();
        assert!(err.to_string().contains("retention_days"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"host\""));
        assert!(json.contains("\"min_transition_interval_ms\""));
    }
}
