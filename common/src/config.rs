use serde::{Deserialize, Serialize};
use std::result::Result as StdResult;
use std::str::FromStr;
use std::time::Duration;
use crate::error::GatewayError;

/// Which backend holds device secrets and nonces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = GatewayError;

    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(GatewayError::ConfigError(format!("Unknown store backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub redis_url: String,
    pub bind_address: String,
    pub store_backend: StoreBackend,
    /// Upper bound on every individual store call.
    pub store_timeout: Duration,
    /// Whether unknown devices may register by sending `x-device-secret`.
    pub allow_bootstrap: bool,
    pub xai_api_key: Option<String>,
    pub xai_model: String,
    pub xai_base_url: String,
    pub rewrite_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            store_backend: StoreBackend::Redis,
            store_timeout: Duration::from_millis(2000),
            allow_bootstrap: true,
            xai_api_key: None,
            xai_model: "grok-4".to_string(),
            xai_base_url: "https://api.x.ai/v1".to_string(),
            rewrite_timeout: Duration::from_millis(30_000),
        }
    }
}

impl Config {
    pub fn load() -> StdResult<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source, falling
    /// back to the defaults for anything unset.
    pub fn from_lookup<F>(lookup: F) -> StdResult<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let store_backend = match lookup("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.store_backend,
        };

        Ok(Self {
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            bind_address: lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            store_backend,
            store_timeout: parse_millis(&lookup, "STORE_TIMEOUT_MS")?
                .unwrap_or(defaults.store_timeout),
            allow_bootstrap: parse_bool(&lookup, "ALLOW_BOOTSTRAP")?
                .unwrap_or(defaults.allow_bootstrap),
            xai_api_key: lookup("XAI_API_KEY").filter(|key| !key.is_empty()),
            xai_model: lookup("XAI_MODEL").unwrap_or(defaults.xai_model),
            xai_base_url: lookup("XAI_BASE_URL").unwrap_or(defaults.xai_base_url),
            rewrite_timeout: parse_millis(&lookup, "REWRITE_TIMEOUT_MS")?
                .unwrap_or(defaults.rewrite_timeout),
        })
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> StdResult<Option<Duration>, GatewayError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| GatewayError::ConfigError(format!("{}: {}", key, e))),
        None => Ok(None),
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> StdResult<Option<bool>, GatewayError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "true" || v == "1" || v == "yes" => Ok(Some(true)),
        Some(v) if v == "false" || v == "0" || v == "no" => Ok(Some(false)),
        Some(v) => Err(GatewayError::ConfigError(format!("{}: not a boolean: {}", key, v))),
        None => Ok(None),
    }
}
