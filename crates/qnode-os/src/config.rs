use std::path::{Path, PathBuf};
use std::time::Duration;

use qnode::hub::HubConfig;

use serde::Deserialize;

use crate::error::Result;

const DEFAULT_BROKER_HOST: &str = "localhost";
const DEFAULT_BROKER_PORT: u16 = 1883;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;
const DEFAULT_STORAGE_PATH: &str = "qnode.json";
const DEFAULT_TICK_MS: u64 = 10;

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// User name.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Keep-alive period, in seconds.
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.into(),
            port: DEFAULT_BROKER_PORT,
            username: None,
            password: None,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
        }
    }
}

impl BrokerConfig {
    /// Returns the keep-alive period.
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// The configuration of a host node.
///
/// ```toml
/// storage = "/var/lib/qnode/kitchen.json"
///
/// [hub]
/// root_topic = "home/nodes"
/// description = "Kitchen node"
///
/// [broker]
/// host = "192.168.1.2"
/// port = 1883
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Hub settings.
    pub hub: HubConfig,
    /// Broker settings.
    pub broker: BrokerConfig,
    /// Path of the persistent storage document.
    pub storage: PathBuf,
    /// Scheduler pass period, in milliseconds.
    pub tick_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hub: HubConfig::default(),
            broker: BrokerConfig::default(),
            storage: PathBuf::from(DEFAULT_STORAGE_PATH),
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl NodeConfig {
    /// Parses a [`NodeConfig`] from `TOML` text.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not a valid configuration.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a [`NodeConfig`] from a `TOML` file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not a valid
    /// configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Returns the scheduler pass period.
    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
