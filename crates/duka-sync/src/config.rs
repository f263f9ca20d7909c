//! # Replication Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DUKA_SYNC_MODE=continuous                                          │
//! │     DUKA_REMOTE_URL=http://10.0.0.5:8765                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/ledger/sync.toml (Linux)                                 │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ReplicationMode::Offline, hub disabled                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! id = "duka-kariakoo"
//! name = "Kariakoo Shop"
//!
//! [replication]
//! mode = "continuous"   # continuous | offline
//! remote_url = "http://10.0.0.5:8765"
//! batch_size = 100
//! poll_interval_secs = 5
//!
//! [hub]
//! enabled = false
//! port = 8765
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ReplicationError, ReplicationResult};

// =============================================================================
// Replication Mode
// =============================================================================

/// Whether the background engine runs at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationMode {
    /// Push and pull every poll interval.
    Continuous,

    /// Local writes only. The outbox keeps growing until replication is
    /// switched on.
    #[default]
    Offline,
}

impl ReplicationMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ReplicationMode::Continuous)
    }
}

impl std::fmt::Display for ReplicationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationMode::Continuous => write!(f, "continuous"),
            ReplicationMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for ReplicationMode {
    type Err = ReplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continuous" | "live" | "on" => Ok(ReplicationMode::Continuous),
            "offline" | "disabled" | "off" => Ok(ReplicationMode::Offline),
            other => Err(ReplicationError::InvalidConfig(format!(
                "Unknown replication mode: '{}'. Valid options: continuous, offline",
                other
            ))),
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// The shop (tenant) this node belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Tenant id, the prefix of every document id written here.
    pub id: String,

    #[serde(default)]
    pub name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            id: "default-store".to_string(),
            name: "Duka".to_string(),
        }
    }
}

// =============================================================================
// Replication Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationSettings {
    #[serde(default)]
    pub mode: ReplicationMode,

    /// Base URL of the replica hub.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Bearer credential sent to the hub.
    #[serde(default)]
    pub credential: Option<String>,

    /// Documents per push request and per pulled page.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Rejections tolerated per outbox entry before it is left behind.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_batch_size() -> u32 {
    100
}
fn default_poll_interval() -> u64 {
    5
}
fn default_request_timeout() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    10
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        ReplicationSettings {
            mode: ReplicationMode::default(),
            remote_url: None,
            credential: None,
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl ReplicationSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

// =============================================================================
// Hub Settings
// =============================================================================

/// Serving the replica API from this node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_hub_port")]
    pub port: u16,

    /// Bearer credential clients must present. `None` accepts everyone.
    #[serde(default)]
    pub credential: Option<String>,
}

/// Default port for the replica hub.
pub const DEFAULT_HUB_PORT: u16 = 8765;

fn default_hub_port() -> u16 {
    DEFAULT_HUB_PORT
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

impl Default for HubSettings {
    fn default() -> Self {
        HubSettings {
            enabled: false,
            bind_addr: default_bind_addr(),
            port: default_hub_port(),
            credential: None,
        }
    }
}

impl HubSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub replication: ReplicationSettings,

    #[serde(default)]
    pub hub: HubSettings,
}

impl SyncConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ReplicationResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReplicationResult<()> {
        if self.store.id.trim().is_empty() {
            return Err(ReplicationError::InvalidConfig("store.id must not be empty".into()));
        }
        if self.store.id.contains(':') {
            return Err(ReplicationError::InvalidConfig(
                "store.id must not contain ':'".into(),
            ));
        }

        match self.replication.remote_url.as_deref() {
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                return Err(ReplicationError::InvalidUrl(format!(
                    "Replica URL must start with http:// or https://, got: {}",
                    url
                )));
            }
            None if self.replication.mode.is_enabled() => {
                return Err(ReplicationError::InvalidConfig(
                    "continuous replication needs replication.remote_url".into(),
                ));
            }
            _ => {}
        }

        if self.replication.batch_size == 0 {
            return Err(ReplicationError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }
        if self.replication.poll_interval_secs == 0 {
            return Err(ReplicationError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `DUKA_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are logged
    /// and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("DUKA_STORE_ID") {
            debug!(store_id = %id, "Overriding store id from environment");
            self.store.id = id;
        }

        if let Some(name) = lookup("DUKA_STORE_NAME") {
            self.store.name = name;
        }

        if let Some(mode) = lookup("DUKA_SYNC_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding replication mode from environment");
                    self.replication.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown replication mode in environment"),
            }
        }

        if let Some(url) = lookup("DUKA_REMOTE_URL") {
            debug!(url = %url, "Overriding replica URL from environment");
            self.replication.remote_url = Some(url);
        }

        if let Some(credential) = lookup("DUKA_SYNC_CREDENTIAL") {
            self.replication.credential = Some(credential);
        }

        if let Some(interval) = lookup("DUKA_SYNC_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(secs) => self.replication.poll_interval_secs = secs,
                Err(_) => warn!(value = %interval, "Invalid poll interval in environment"),
            }
        }

        if let Some(enabled) = lookup("DUKA_HUB_ENABLED") {
            self.hub.enabled = matches!(enabled.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(port) = lookup("DUKA_HUB_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding hub port from environment");
                    self.hub.port = p;
                }
                Err(_) => warn!(value = %port, "Invalid hub port in environment"),
            }
        }

        if let Some(credential) = lookup("DUKA_HUB_CREDENTIAL") {
            self.hub.credential = Some(credential);
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "duka", "ledger")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn tenant_id(&self) -> &str {
        &self.store.id
    }

    pub fn mode(&self) -> ReplicationMode {
        self.replication.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.replication.mode.is_enabled()
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.replication.remote_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("continuous".parse::<ReplicationMode>().unwrap(), ReplicationMode::Continuous);
        assert_eq!("OFF".parse::<ReplicationMode>().unwrap(), ReplicationMode::Offline);
        assert!("sometimes".parse::<ReplicationMode>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.mode(), ReplicationMode::Offline);
        assert_eq!(config.replication.batch_size, 100);
        assert_eq!(config.hub.port, DEFAULT_HUB_PORT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = SyncConfig::default();

        config.replication.mode = ReplicationMode::Continuous;
        assert!(config.validate().is_err());

        config.replication.remote_url = Some("ws://hub:8765".into());
        assert!(matches!(config.validate(), Err(ReplicationError::InvalidUrl(_))));

        config.replication.remote_url = Some("http://hub:8765".into());
        assert!(config.validate().is_ok());

        config.store.id = "a:b".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DUKA_STORE_ID", "kariakoo"),
            ("DUKA_SYNC_MODE", "continuous"),
            ("DUKA_REMOTE_URL", "http://10.0.0.5:8765"),
            ("DUKA_HUB_ENABLED", "true"),
            ("DUKA_HUB_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.tenant_id(), "kariakoo");
        assert!(config.is_enabled());
        assert_eq!(config.remote_url(), Some("http://10.0.0.5:8765"));
        assert!(config.hub.enabled);
        assert_eq!(config.hub.port, DEFAULT_HUB_PORT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_keeps_unset_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");
        std::fs::write(
            &path,
            r#"
            [store]
            id = "kariakoo"

            [replication]
            mode = "continuous"
            remote_url = "http://hub:8765"
            batch_size = 20
            "#,
        )
        .unwrap();

        let config = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(config.tenant_id(), "kariakoo");
        assert_eq!(config.replication.batch_size, 20);
        assert_eq!(config.replication.poll_interval_secs, 5);
        assert!(!config.hub.enabled);
    }
}
