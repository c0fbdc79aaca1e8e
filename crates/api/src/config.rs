//! Server configuration, read once from the environment at startup.

use std::net::SocketAddr;

use thiserror::Error;

use hotelmenu_core::DEFAULT_CURRENCY;
use hotelmenu_infra::AdmissionPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Listen address (env: BIND_ADDR, default 0.0.0.0:8080)
    pub bind_addr: SocketAddr,
    /// Use Postgres instead of the in-memory store (env: USE_PERSISTENT_STORES)
    pub use_persistent_stores: bool,
    /// Postgres connection URL (env: DATABASE_URL)
    pub database_url: Option<String>,
    /// Booking admission policy (env: ADMISSION_POLICY, default counter_only)
    pub admission_policy: AdmissionPolicy,
    /// Currency for products created without one (env: DEFAULT_CURRENCY)
    pub default_currency: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            use_persistent_stores: false,
            database_url: None,
            admission_policy: AdmissionPolicy::default(),
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; unset and blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.bind_addr,
        };

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::Invalid {
                name: "USE_PERSISTENT_STORES",
                value: raw.clone(),
                reason: "expected true or false".to_string(),
            })?,
            None => false,
        };

        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let admission_policy = match get("ADMISSION_POLICY") {
            Some(raw) => raw.parse::<AdmissionPolicy>().map_err(|e| ConfigError::Invalid {
                name: "ADMISSION_POLICY",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.admission_policy,
        };

        let default_currency = get("DEFAULT_CURRENCY")
            .map(|c| c.to_uppercase())
            .unwrap_or(defaults.default_currency);

        Ok(Self {
            bind_addr,
            use_persistent_stores,
            database_url,
            admission_policy,
            default_currency,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
