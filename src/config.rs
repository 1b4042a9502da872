//! Settings for the confkv server and CLI.
//!
//! Settings come from an optional TOML file (`confkv.toml`); every section
//! and field is optional and falls back to a default. CLI flags and
//! environment variables override file values at the call site.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [storage]
//! database_url = "postgres://localhost/confkv"
//! max_connections = 10
//!
//! [remote]
//! url = "https://config.internal/v1"
//! timeout_secs = 10
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::{BackendConfig, DEFAULT_MAX_CONNECTIONS};

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = "confkv.toml";

/// Result of settings validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Root settings structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub remote: RemoteSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

/// Storage backend settings for the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    /// PostgreSQL URL; takes precedence over `path`.
    pub database_url: Option<String>,
    /// Embedded SQLite database file.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            path: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Remote peer settings for the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSettings {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

impl ServerSettings {
    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid server host '{}'", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl StorageSettings {
    /// Backend the server should open: PostgreSQL, then a SQLite file, then memory.
    #[must_use]
    pub fn backend(&self) -> BackendConfig {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return BackendConfig::Postgres {
                url: url.to_string(),
                max_connections: self.max_connections,
            };
        }
        match &self.path {
            Some(path) => BackendConfig::Sqlite { path: path.clone() },
            None => BackendConfig::Memory,
        }
    }
}

impl RemoteSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Loads `confkv.toml` from the working directory, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Path::new(SETTINGS_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load settings from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - A field has the wrong type or is unknown
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        Ok(settings)
    }

    /// Validate settings.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails with one or more errors:
    /// - Port 0 or an unparseable host
    /// - Zero timeouts or pool size
    /// - A remote URL that is not http(s)
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Server
        if self.server.port == 0 {
            errors.push(
                "server.port cannot be 0. Use a valid port number (1-65535)".to_string(),
            );
        }
        if self.server.host.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "server.host must be an IP address (got: '{}')",
                self.server.host
            ));
        }
        if self.server.request_timeout_secs == 0 {
            errors.push("server.request_timeout_secs must be at least 1".to_string());
        }

        // 2. Storage
        if self.storage.max_connections == 0 {
            errors.push("storage.max_connections must be at least 1".to_string());
        }
        if self.storage.database_url.is_some() && self.storage.path.is_some() {
            warnings.push(
                "Both storage.database_url and storage.path are set\n  \
                 storage.path is ignored while a database URL is configured"
                    .to_string(),
            );
        }

        // 3. Remote
        if self.remote.timeout_secs == 0 {
            errors.push("remote.timeout_secs must be at least 1".to_string());
        }
        if let Some(raw) = &self.remote.url {
            match url::Url::parse(raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {},
                Ok(url) => errors.push(format!(
                    "remote.url must use http or https (got scheme '{}')",
                    url.scheme()
                )),
                Err(e) => errors.push(format!("remote.url is not a valid URL: {e}")),
            }
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Settings validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}
