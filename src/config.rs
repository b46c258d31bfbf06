//! Live-sync configuration.
//!
//! Loaded from `<config dir>/trivia-live/config.toml` when present:
//!
//! ```toml
//! environment = "production"
//! page_origin = "https://admin.example.com"
//! reconnect_attempts = 5
//! reconnect_interval_ms = 1000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::backoff::ReconnectPolicy;
use crate::error::{Result, SyncError};

/// Endpoint used when running against a local development server
pub const DEV_SOCKET_URL: &str = "ws://localhost:3001/ws";

/// Path the broadcaster is mounted on in production
pub const SOCKET_PATH: &str = "/ws";

/// Where the dashboard is being served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Explicit socket URL; overrides environment-based resolution
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum reconnect attempts before giving up
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Base reconnect delay in milliseconds (doubled per attempt)
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Upper bound for the reconnect delay
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// How long one opening handshake may take before it counts as failed
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Connect as soon as the client is constructed
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,

    /// Activity feed capacity
    #[serde(default = "default_max_activity_entries")]
    pub max_activity_entries: usize,

    #[serde(default)]
    pub environment: Environment,

    /// Origin of the page hosting the dashboard (production only)
    #[serde(default)]
    pub page_origin: Option<String>,
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_interval_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_auto_connect() -> bool {
    true
}

fn default_max_activity_entries() -> usize {
    50
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: None,
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            auto_connect: default_auto_connect(),
            max_activity_entries: default_max_activity_entries(),
            environment: Environment::default(),
            page_origin: None,
        }
    }
}

impl SyncConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("trivia-live").join("config.toml"))
    }

    /// Load configuration from the default path, falling back to defaults
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SyncError::ConfigError {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    pub fn with_reconnect(mut self, attempts: u32, interval_ms: u64, max_delay_ms: u64) -> Self {
        self.reconnect_attempts = attempts;
        self.reconnect_interval_ms = interval_ms;
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_activity_entries(mut self, max: usize) -> Self {
        self.max_activity_entries = max;
        self
    }

    /// Reconnect policy described by this config
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_interval_ms),
            Duration::from_millis(self.max_reconnect_delay_ms),
            self.reconnect_attempts,
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Resolve the socket endpoint.
    ///
    /// An explicit `url` wins. Otherwise development uses [`DEV_SOCKET_URL`]
    /// and production upgrades the page origin (`http` -> `ws`,
    /// `https` -> `wss`) and mounts [`SOCKET_PATH`].
    pub fn resolve_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            let parsed = parse_url(url)?;
            return match parsed.scheme() {
                "ws" | "wss" => Ok(parsed.to_string()),
                other => Err(SyncError::InvalidUrl {
                    url: url.clone(),
                    message: format!("expected ws or wss scheme, got '{}'", other),
                }),
            };
        }

        match self.environment {
            Environment::Development => Ok(DEV_SOCKET_URL.to_string()),
            Environment::Production => {
                let origin = self.page_origin.as_deref().ok_or_else(|| SyncError::ConfigError {
                    message: "production environment requires page_origin or url".to_string(),
                })?;
                socket_url_for_origin(origin)
            }
        }
    }
}

/// Derive the socket URL from the page origin.
pub fn socket_url_for_origin(origin: &str) -> Result<String> {
    let mut url = parse_url(origin)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(SyncError::InvalidUrl {
                url: origin.to_string(),
                message: format!("unsupported scheme '{}'", other),
            })
        }
    };

    url.set_scheme(scheme).map_err(|_| SyncError::InvalidUrl {
        url: origin.to_string(),
        message: "cannot switch to websocket scheme".to_string(),
    })?;
    url.set_path(SOCKET_PATH);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.to_string())
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| SyncError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(SyncError::InvalidUrl {
            url: raw.to_string(),
            message: "missing host".to_string(),
        });
    }
    Ok(url)
}
