//! Transport configuration, loadable from serde sources or the environment.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Configuration for the store connection and its pool.
///
/// # Environment Variables
///
/// - `KVCACHE_ADDR`: store address (default: `127.0.0.1:6379`)
/// - `KVCACHE_MAX_IDLE`: idle connections kept (default: 8)
/// - `KVCACHE_MAX_TOTAL`: connection cap (default: 16)
/// - `KVCACHE_TIMEOUT_MS`: read, write, and connect timeout (default: none)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Store address, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Optional TCP read timeout, in milliseconds when deserialized.
    #[serde(rename = "read_timeout_ms", deserialize_with = "millis")]
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout, in milliseconds when deserialized.
    #[serde(rename = "write_timeout_ms", deserialize_with = "millis")]
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout, in milliseconds when deserialized.
    #[serde(rename = "connect_timeout_ms", deserialize_with = "millis")]
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:6379".to_string(),
            max_idle: 8,
            max_total: 16,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Loads the configuration from `KVCACHE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = ClientConfig::default();
        if let Some(addr) = lookup("KVCACHE_ADDR") {
            config.addr = addr;
        }
        if let Some(raw) = lookup("KVCACHE_MAX_IDLE") {
            config.max_idle = parse_number("KVCACHE_MAX_IDLE", raw)?;
        }
        if let Some(raw) = lookup("KVCACHE_MAX_TOTAL") {
            config.max_total = parse_number("KVCACHE_MAX_TOTAL", raw)?;
        }
        if let Some(raw) = lookup("KVCACHE_TIMEOUT_MS") {
            let timeout = Some(Duration::from_millis(parse_number("KVCACHE_TIMEOUT_MS", raw)?));
            config.read_timeout = timeout;
            config.write_timeout = timeout;
            config.connect_timeout = timeout;
        }
        Ok(config)
    }
}

pub(crate) fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: String,
) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value: raw })
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}
