use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::rates::{HttpRateSource, RateCache};
use crate::schedule::ConflictPolicy;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub default_school_id: Arc<str>,
    pub conflict_policy: ConflictPolicy,
    pub rates: Option<Arc<RateCache>>,
}

impl AppState {
    pub fn new(pool: SqlitePool, default_school_id: &str, conflict_policy: ConflictPolicy) -> Self {
        Self {
            pool,
            default_school_id: Arc::from(default_school_id),
            conflict_policy,
            rates: None,
        }
    }

    /// Build state from configuration, wiring the HTTP rate source if set.
    pub fn from_config(pool: SqlitePool, config: &Config) -> Self {
        let state = Self::new(pool, &config.default_school_id, config.conflict_policy);
        match &config.rates_url {
            Some(url) => state.with_rates(Arc::new(RateCache::new(
                Arc::new(HttpRateSource::new(url.as_str())),
                config.rates_ttl,
            ))),
            None => state,
        }
    }

    pub fn with_rates(mut self, rates: Arc<RateCache>) -> Self {
        self.rates = Some(rates);
        self
    }

    /// The request's tenant, falling back to the default school.
    pub fn school_or_default(&self, school_id: Option<&str>) -> String {
        match school_id.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => self.default_school_id.to_string(),
        }
    }
}
