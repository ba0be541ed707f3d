use std::net::SocketAddr;
use std::time::Duration;

use crate::schedule::ConflictPolicy;

/// Server configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    /// Tenant assigned to rows created without an explicit `school_id`.
    pub default_school_id: String,
    pub conflict_policy: ConflictPolicy,
    /// Exchange-rate endpoint. Rate routes are unavailable without it.
    pub rates_url: Option<String>,
    pub rates_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    /// DATABASE_URL defaults to "sqlite://lessonbook.db"
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://lessonbook.db".to_string());

        let listen_addr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("LISTEN_ADDR", "must be a valid socket address"))?;

        let default_school_id =
            std::env::var("DEFAULT_SCHOOL_ID").unwrap_or_else(|_| "default".to_string());
        if default_school_id.trim().is_empty() {
            return Err(ConfigError::Invalid("DEFAULT_SCHOOL_ID", "must not be empty"));
        }

        let conflict_policy = match std::env::var("CONFLICT_POLICY") {
            Ok(s) => s.parse().map_err(|_| {
                ConfigError::Invalid("CONFLICT_POLICY", "must be fail-open or fail-closed")
            })?,
            Err(_) => ConflictPolicy::default(),
        };

        let rates_url = std::env::var("RATES_URL").ok().filter(|s| !s.is_empty());

        let rates_ttl_secs = std::env::var("RATES_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid("RATES_TTL_SECS", "must be a number of seconds"))?;

        Ok(Config {
            listen_addr,
            database_url,
            default_school_id,
            conflict_policy,
            rates_url,
            rates_ttl: Duration::from_secs(rates_ttl_secs),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid(&'static str, &'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid(var, msg) => write!(f, "Invalid value for {}: {}", var, msg),
        }
    }
}

impl std::error::Error for ConfigError {}
