//! Crawler configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use wotcrawl_protocol::TransportSettings;
use wotcrawl_types::Endpoint;

use crate::NetworkError;

/// Configuration for crawling one currency network.
///
/// Can be loaded from a TOML file via [`CrawlerConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Currency whose network is crawled.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Trusted nodes to start from, as `host:port`, `https://host:port`, or
    /// a full endpoint line such as `BMAS g1.example.org 443`.
    #[serde(default)]
    pub root_nodes: Vec<String>,

    /// Pause between two node refreshes within a crawl pass.
    #[serde(default = "default_crawl_interval_secs")]
    pub crawl_interval_secs: u64,

    /// How long a node may stay offline or corrupted before it is dropped.
    #[serde(default = "default_eviction_timeout_secs")]
    pub eviction_timeout_secs: u64,

    /// A node's software summary is pulled once every this many refreshes.
    #[serde(default = "default_summary_refresh_every")]
    pub summary_refresh_every: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// HTTP proxy for one-shot requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Where known nodes are persisted between runs.
    #[serde(default = "default_nodes_file")]
    pub nodes_file: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_currency() -> String {
    "g1".to_string()
}

fn default_crawl_interval_secs() -> u64 {
    15
}

fn default_eviction_timeout_secs() -> u64 {
    3600
}

fn default_summary_refresh_every() -> u32 {
    20
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_nodes_file() -> PathBuf {
    PathBuf::from("./wotcrawl-nodes.json")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl CrawlerConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NetworkError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NetworkError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NetworkError> {
        toml::from_str(s).map_err(|e| NetworkError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("CrawlerConfig is always serializable to TOML")
    }

    /// Settings for the HTTP and WebSocket client.
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            proxy: self.proxy.clone(),
        }
    }

    /// Settings for the crawl loop and the node registry.
    pub fn network_settings(&self) -> NetworkSettings {
        NetworkSettings {
            crawl_interval: Duration::from_secs(self.crawl_interval_secs),
            eviction_timeout_secs: self.eviction_timeout_secs,
            summary_refresh_every: self.summary_refresh_every.max(1),
        }
    }

    /// Parsed [`root_nodes`](Self::root_nodes).
    pub fn root_addresses(&self) -> Result<Vec<RootAddress>, NetworkError> {
        self.root_nodes.iter().map(|s| s.parse()).collect()
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            root_nodes: Vec::new(),
            crawl_interval_secs: default_crawl_interval_secs(),
            eviction_timeout_secs: default_eviction_timeout_secs(),
            summary_refresh_every: default_summary_refresh_every(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            proxy: None,
            nodes_file: default_nodes_file(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

/// Timing knobs of a [`Network`](crate::Network).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkSettings {
    pub crawl_interval: Duration,
    pub eviction_timeout_secs: u64,
    pub summary_refresh_every: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        CrawlerConfig::default().network_settings()
    }
}

/// Address of a root node, before its peer document is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootAddress {
    pub secured: bool,
    pub host: String,
    pub port: u16,
}

impl FromStr for RootAddress {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || NetworkError::Config(format!("invalid root node address: {s:?}"));

        if s.contains(char::is_whitespace) {
            let endpoint: Endpoint = s.parse().map_err(|_| invalid())?;
            let address = endpoint.address().ok_or_else(invalid)?;
            return Ok(Self {
                secured: matches!(endpoint, Endpoint::Bmas(_)),
                host: address.host().ok_or_else(invalid)?,
                port: address.port,
            });
        }

        let (secured, rest) = if let Some(rest) = s.strip_prefix("https://") {
            (true, rest)
        } else {
            (false, s.strip_prefix("http://").unwrap_or(s))
        };
        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            secured,
            host: host.to_string(),
            port,
        })
    }
}
