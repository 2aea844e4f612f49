use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::DEFAULT_PRICE_TTL_SECS;
use crate::error::Result;
use crate::sources::PriceOracle;
use crate::types::PriceQuote;

/// Memoizes settlement-asset spot prices for a configured TTL.
///
/// Refreshes are coalesced per asset: the first caller past the TTL takes
/// the asset's refresh lock and hits the oracle, everyone queued behind it
/// re-checks the cache and reuses the new quote.
pub struct PriceCache {
    oracle: Arc<dyn PriceOracle>,
    ttl: Duration,
    quotes: RwLock<HashMap<String, PriceQuote>>,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PriceCache {
    pub fn new(oracle: Arc<dyn PriceOracle>) -> Self {
        Self::with_ttl(oracle, Duration::from_secs(DEFAULT_PRICE_TTL_SECS))
    }

    pub fn with_ttl(oracle: Arc<dyn PriceOracle>, ttl: Duration) -> Self {
        Self {
            oracle,
            ttl,
            quotes: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fiat spot price for `asset`, refreshed from the oracle when stale
    pub async fn get_price(&self, asset: &str) -> Result<f64> {
        if let Some(price) = self.fresh_price(asset) {
            return Ok(price);
        }

        let lock = self.refresh_lock(asset);
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we were queued
        if let Some(price) = self.fresh_price(asset) {
            tracing::trace!(asset, "price refreshed by concurrent caller");
            return Ok(price);
        }

        let fiat_value = self.oracle.spot_price(asset).await?;
        let quote = PriceQuote {
            asset: asset.to_string(),
            fiat_value,
            fetched_at: Instant::now(),
        };
        tracing::debug!(asset, fiat_value, "price quote refreshed");
        self.quotes.write().insert(asset.to_string(), quote);

        Ok(fiat_value)
    }

    /// Current cached quote, fresh or not, without touching the oracle
    pub fn quote(&self, asset: &str) -> Option<PriceQuote> {
        self.quotes.read().get(asset).cloned()
    }

    fn fresh_price(&self, asset: &str) -> Option<f64> {
        let quotes = self.quotes.read();
        let quote = quotes.get(asset)?;
        if quote.fetched_at.elapsed() < self.ttl {
            Some(quote.fiat_value)
        } else {
            None
        }
    }

    fn refresh_lock(&self, asset: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.refresh_locks
            .lock()
            .entry(asset.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
