//! Server configuration.

use axum_server::tls_rustls::RustlsConfig;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Settings for the HTTP server and its storage.
///
/// Setting both `cert` and `key` serves HTTPS; leaving both unset serves
/// plain HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[serde(default)]
#[setters(prefix = "with_", into)]
pub struct ServerConfig {
    /// TCP address to listen on.
    addr: String,

    /// Directory holding one file per game.
    storage_path: PathBuf,

    /// Base URL reported in the location of new games.
    #[setters(strip_option)]
    public_url: Option<String>,

    /// PEM certificate chain for TLS.
    #[setters(strip_option)]
    cert: Option<PathBuf>,

    /// PEM private key for TLS.
    #[setters(strip_option)]
    key: Option<PathBuf>,

    /// How long shutdown waits for in-flight storage operations.
    shutdown_grace_ms: u64,

    /// Enables debug logging for the service crates.
    debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            storage_path: PathBuf::from("storage"),
            public_url: None,
            cert: None,
            key: None,
            shutdown_grace_ms: 1000,
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file can't be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(addr = %config.addr, "Config loaded successfully");
        Ok(config)
    }

    /// Base URL for game locations. Defaults to `https://<addr>` when TLS
    /// is configured and `http://<addr>` otherwise.
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if self.cert.is_some() && self.key.is_some() => {
                format!("https://{}", self.addr)
            }
            None => format!("http://{}", self.addr),
        }
    }

    /// Certificate and key paths, if TLS is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if only one of the two is set.
    pub fn tls_files(&self) -> Result<Option<(&Path, &Path)>, ConfigError> {
        match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => Ok(Some((cert.as_path(), key.as_path()))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::new("cert and key must be set together")),
        }
    }

    /// Loads the rustls server config from the PEM files, if TLS is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a half-configured pair or unreadable
    /// or invalid PEM files.
    #[instrument(skip(self))]
    pub async fn rustls_config(&self) -> Result<Option<RustlsConfig>, ConfigError> {
        let Some((cert, key)) = self.tls_files()? else {
            return Ok(None);
        };

        let tls = RustlsConfig::from_pem_file(cert, key).await.map_err(|e| {
            ConfigError::new(format!(
                "Failed to load TLS files {} and {}: {}",
                cert.display(),
                key.display(),
                e
            ))
        })?;

        info!(cert = %cert.display(), "TLS enabled");
        Ok(Some(tls))
    }

    /// Shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
