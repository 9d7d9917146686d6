//! Discovery configuration loaded from TOML.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use netguardian_types::{CandidateEndpoint, SubnetPrefix};
use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        self.discovery.validate()
    }
}

/// How candidates are built, probed and swept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Fixed control port of the backend.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Subnets to sweep, in priority order.
    #[serde(default = "SubnetPrefix::defaults")]
    pub prefixes: Vec<SubnetPrefix>,
    #[serde(default = "default_first_host")]
    pub first_host: u8,
    #[serde(default = "default_last_host")]
    pub last_host: u8,
    /// Probes per batch; also the bound on concurrent outbound requests.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_sweep_timeout_ms")]
    pub sweep_timeout_ms: u64,
    #[serde(default = "default_reconnect_timeout_ms")]
    pub reconnect_timeout_ms: u64,
    /// Abort the rest of a batch as soon as its winner is known.
    #[serde(default)]
    pub cancel_siblings_on_first_success: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            port: default_port(),
            health_path: default_health_path(),
            prefixes: SubnetPrefix::defaults(),
            first_host: default_first_host(),
            last_host: default_last_host(),
            batch_size: default_batch_size(),
            sweep_timeout_ms: default_sweep_timeout_ms(),
            reconnect_timeout_ms: default_reconnect_timeout_ms(),
            cancel_siblings_on_first_success: false,
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        let fail = |msg: String| Err(DiscoveryError::Config(msg));

        if self.scheme != "http" && self.scheme != "https" {
            return fail(format!("scheme must be http or https, got {:?}", self.scheme));
        }
        if self.port == 0 {
            return fail("port must be non-zero".to_string());
        }
        if !self.health_path.starts_with('/') {
            return fail(format!(
                "health_path must start with '/', got {:?}",
                self.health_path
            ));
        }
        if self.prefixes.is_empty() {
            return fail("at least one subnet prefix is required".to_string());
        }
        if self.first_host == 0 || self.last_host == 255 || self.first_host > self.last_host {
            return fail(format!(
                "host range {}..={} must lie within 1..=254",
                self.first_host, self.last_host
            ));
        }
        if self.batch_size == 0 {
            return fail("batch_size must be at least 1".to_string());
        }
        if self.sweep_timeout_ms == 0 || self.reconnect_timeout_ms == 0 {
            return fail("probe timeouts must be non-zero".to_string());
        }
        Ok(())
    }

    /// Per-host timeout used while sweeping.
    pub fn sweep_timeout(&self) -> Duration {
        Duration::from_millis(self.sweep_timeout_ms)
    }

    /// Timeout for the cached-endpoint check.
    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnect_timeout_ms)
    }

    /// Last octets probed in every subnet, ascending.
    pub fn host_range(&self) -> RangeInclusive<u8> {
        self.first_host..=self.last_host
    }

    /// Candidate for one host of `prefix`.
    pub fn candidate(&self, prefix: SubnetPrefix, last_octet: u8) -> CandidateEndpoint {
        CandidateEndpoint::from_host(&self.scheme, prefix.host(last_octet), self.port)
    }
}

/// Where the last verified endpoint is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Defaults to `<data dir>/netguardian/endpoint.toml`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_port() -> u16 {
    49152
}

fn default_health_path() -> String {
    "/api/health".to_string()
}

fn default_first_host() -> u8 {
    1
}

fn default_last_host() -> u8 {
    254
}

fn default_batch_size() -> usize {
    30
}

fn default_sweep_timeout_ms() -> u64 {
    1200
}

fn default_reconnect_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}
