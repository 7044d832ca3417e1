//! Configuration Module
//!
//! Handles loading cache configuration from environment variables and turning
//! it into per-cache options.

use std::env;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::cache::Loader;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Identifier stamped on every record of the cache
    pub cache_id: String,
    /// Default TTL in milliseconds, None = records never expire
    pub default_ttl: Option<u64>,
    /// Extra arguments passed to fallback loaders after the key
    pub fallback_args: Vec<Value>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_ID` - Cache identifier (default: "default")
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: unset, no expiry)
    /// - `FALLBACK_ARGS` - JSON array of loader arguments (default: `[]`)
    pub fn from_env() -> Self {
        Self {
            cache_id: env::var("CACHE_ID").unwrap_or_else(|_| "default".to_string()),
            default_ttl: env::var("DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
            fallback_args: env::var("FALLBACK_ARGS")
                .ok()
                .map(|v| parse_fallback_args(&v))
                .unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_id: "default".to_string(),
            default_ttl: None,
            fallback_args: Vec::new(),
        }
    }
}

fn parse_fallback_args(raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(args) => args,
        Err(e) => {
            warn!("Ignoring FALLBACK_ARGS, expected a JSON array: {}", e);
            Vec::new()
        }
    }
}

// == Cache Options ==
/// Settings a cache consults on every write and read-miss.
#[derive(Debug, Clone)]
pub struct CacheOptions<K, V> {
    pub cache_id: String,
    /// Default TTL in milliseconds, None = records never expire
    pub default_ttl: Option<u64>,
    /// Loader used on a miss when the caller supplies none
    pub default_fallback: Option<Loader<K, V>>,
    pub fallback_args: Vec<Value>,
}

impl<K, V> CacheOptions<K, V> {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_id: config.cache_id.clone(),
            default_ttl: config.default_ttl,
            default_fallback: None,
            fallback_args: config.fallback_args.clone(),
        }
    }

    pub fn with_fallback(mut self, loader: Loader<K, V>) -> Self {
        self.default_fallback = Some(loader);
        self
    }
}

impl<K, V> Default for CacheOptions<K, V> {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
