//! CrawlHive configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main CrawlHive configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlHiveConfig {
    /// Dispatcher configuration
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Agent channel configuration
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Client connection pool configuration
    #[serde(default)]
    pub pool: PoolConfig,

    /// Crawler defaults
    #[serde(default)]
    pub crawler: CrawlerConfig,
}

/// Backend command dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Receive poll slice in milliseconds; an empty slice is a normal,
    /// recoverable event, not a protocol error
    pub recv_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            recv_timeout_ms: 500,
        }
    }
}

impl DispatcherConfig {
    /// The dispatcher's bind/connect address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Agent process and channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Host agents bind their command servers on
    pub host: String,

    /// Base command port; agent N listens on `base_command_port + N`
    pub base_command_port: u16,

    /// Port of the shared status hub
    pub status_port: u16,

    /// Client-side request timeout in seconds
    pub command_timeout_secs: u64,

    /// How long a stop waits for process exit before force-killing
    pub join_timeout_secs: u64,

    /// Command server poll slice in milliseconds
    pub poll_interval_ms: u64,

    /// Backoff after a runtime loop error in milliseconds
    pub error_backoff_ms: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_command_port: 5500,
            status_port: 5600,
            command_timeout_secs: 5,
            join_timeout_secs: 5,
            poll_interval_ms: 500,
            error_backoff_ms: 1000,
        }
    }
}

impl AgentsConfig {
    /// Command channel address for one agent
    pub fn command_addr(&self, agent_id: u32) -> String {
        format!("{}:{}", self.host, self.base_command_port as u32 + agent_id)
    }

    /// Status hub address shared by every agent
    pub fn status_addr(&self) -> String {
        format!("{}:{}", self.host, self.status_port)
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of pooled client sockets
    pub capacity: usize,

    /// Per-request reply timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            request_timeout_secs: 5,
        }
    }
}

/// Crawler behavior defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Listing limit applied when a plain `crawl` carries no limits
    pub default_max_listings: u32,

    /// Document limit applied when a plain `crawl` carries no limits
    pub default_max_documents: u32,

    /// Simulated per-item delay in milliseconds
    pub item_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            default_max_listings: 10,
            default_max_documents: 5,
            item_delay_ms: 50,
        }
    }
}

impl CrawlHiveConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load from an explicit path, or from the platform config dir when one
    /// exists there, or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        if let Some(default_path) = Self::default_path() {
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }
        Ok(Self::default())
    }

    /// Platform default configuration path
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join("crawlhive").join("config.toml"))
    }
}
