//! # Node Configuration
//!
//! Everything the node process needs: the replication sections shared with
//! `duka-sync`, plus the database file, the operation endpoint, the
//! connectivity probe and the receipt spool.
//!
//! ## Configuration Sources (in priority order)
//! 1. Environment variables (`DUKA_*`)
//! 2. Config file (`node.toml` in the platform config directory)
//! 3. Default values
//!
//! ## Example `node.toml`
//! ```toml
//! [store]
//! id = "kariakoo"
//! name = "Kariakoo Shop"
//!
//! [replication]
//! mode = "continuous"
//! remote_url = "http://192.168.1.10:8765"
//!
//! [server]
//! port = 8080
//!
//! [probe]
//! url = "https://clients3.google.com/generate_204"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use duka_sync::{ReplicationError, ReplicationResult, SyncConfig};

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "duka";
const APPLICATION: &str = "ledger";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `None` puts it in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Where the operation endpoint listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_bind")]
    pub bind_addr: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

pub const DEFAULT_SERVER_PORT: u16 = 8080;

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_server_bind(),
            port: default_server_port(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Target of the connectivity check. `None` falls back to the replica URL.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

fn default_probe_timeout() -> u64 {
    5
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            url: None,
            timeout_secs: default_probe_timeout(),
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptSettings {
    /// Spool directory for printed receipts. `None` disables printing.
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
}

// =============================================================================
// Node Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// `[store]`, `[replication]` and `[hub]`.
    #[serde(flatten)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub receipts: ReceiptSettings,
}

impl NodeConfig {
    /// Loads from file, then environment, then validates.
    pub fn load(config_path: Option<PathBuf>) -> ReplicationResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading node config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReplicationResult<()> {
        self.sync.validate()?;

        if self.server.port == 0 {
            return Err(ReplicationError::InvalidConfig(
                "server port must be set".into(),
            ));
        }

        if let Some(url) = &self.probe.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ReplicationError::InvalidUrl(format!(
                    "probe url must be http(s): {}",
                    url
                )));
            }
        }

        if self.probe.timeout_secs == 0 {
            return Err(ReplicationError::InvalidConfig(
                "probe timeout must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `DUKA_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.sync.apply_overrides(&lookup);

        if let Some(path) = lookup("DUKA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(port) = lookup("DUKA_SERVER_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(value = %port, "Invalid server port in environment"),
            }
        }

        if let Some(url) = lookup("DUKA_PROBE_URL") {
            self.probe.url = Some(url);
        }

        if let Some(dir) = lookup("DUKA_RECEIPT_DIR") {
            self.receipts.spool_dir = Some(PathBuf::from(dir));
        }
    }

    /// Database file, defaulting to the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .map(|dirs| dirs.data_dir().join("duka.db"))
            .unwrap_or_else(|| PathBuf::from("duka.db"))
    }

    /// Probe target: the configured URL, else the replica.
    pub fn probe_url(&self) -> Option<&str> {
        self.probe.url.as_deref().or_else(|| self.sync.remote_url())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .map(|dirs| dirs.config_dir().join("node.toml"))
    }
}
