//! Currency exchange rates with a per-base-currency TTL cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::RateError;

/// Rates from one base currency to every quoted currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
    pub fetched_at: DateTime<Utc>,
}

impl RateTable {
    pub fn rate_to(&self, quote: &str) -> Option<f64> {
        if quote == self.base {
            return Some(1.0);
        }
        self.rates.get(quote).copied()
    }
}

/// Where fresh rate tables come from.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self, base: &str) -> Result<BTreeMap<String, f64>, RateError>;
}

/// Fetches `GET {base_url}/{BASE}` and reads the `rates` object from the
/// JSON response.
pub struct HttpRateSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RatesPayload {
    rates: BTreeMap<String, f64>,
}

impl HttpRateSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self, base: &str) -> Result<BTreeMap<String, f64>, RateError> {
        let url = format!("{}/{}", self.base_url, base);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RateError::Source(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let payload: RatesPayload = response.json().await?;
        Ok(payload.rates)
    }
}

struct CachedTable {
    table: RateTable,
    loaded: Instant,
}

/// Caches rate tables per base currency for `ttl`.
///
/// When a refresh fails and an expired table is still held, the expired
/// table is served.
pub struct RateCache {
    source: Arc<dyn RateSource>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedTable>>,
}

impl RateCache {
    pub fn new(source: Arc<dyn RateSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Rate table for `base`, an upper-case currency code.
    pub async fn table(&self, base: &str) -> Result<RateTable, RateError> {
        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(base) {
                if cached.loaded.elapsed() < self.ttl {
                    return Ok(cached.table.clone());
                }
            }
        }

        match self.source.fetch(base).await {
            Ok(rates) => {
                let table = RateTable {
                    base: base.to_string(),
                    rates,
                    fetched_at: Utc::now(),
                };
                self.entries.write().await.insert(
                    base.to_string(),
                    CachedTable {
                        table: table.clone(),
                        loaded: Instant::now(),
                    },
                );
                tracing::debug!("Refreshed exchange rates for {}", base);
                Ok(table)
            }
            Err(e) => {
                if let Some(cached) = self.entries.read().await.get(base) {
                    tracing::warn!("Serving stale exchange rates for {}: {}", base, e);
                    return Ok(cached.table.clone());
                }
                Err(e)
            }
        }
    }

    /// Exchange rate from `from` to `to`.
    pub async fn rate(&self, from: &str, to: &str) -> Result<f64, RateError> {
        if from == to {
            return Ok(1.0);
        }
        self.table(from)
            .await?
            .rate_to(to)
            .ok_or_else(|| RateError::UnknownCurrency(from.to_string(), to.to_string()))
    }

    /// Drop every cached table.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
