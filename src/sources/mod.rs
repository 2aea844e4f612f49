//! Upstream data sources: chain transfers, spot prices and market caps.
//!
//! Each collaborator sits behind a trait so the runner can be driven by
//! in-memory doubles in tests and by the HTTP clients in production.

pub mod coingecko;
pub mod etherscan;

pub use coingecko::CoinGeckoClient;
pub use etherscan::EtherscanSource;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChainResponse, TrackedAsset};

/// Returns the most recent token transfers for a tracked asset
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Network-level failures are `FetchFailed`; an upstream "nothing found"
    /// answer is `ChainResponse::NoResults`, not an error.
    async fn token_transfers(&self, asset: &TrackedAsset) -> Result<ChainResponse>;
}

/// Returns the current fiat spot price of a settlement asset
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn spot_price(&self, asset: &str) -> Result<f64>;
}

/// Returns the fiat market capitalization of a token
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn market_cap(&self, asset: &TrackedAsset) -> Result<f64>;
}

/// Shared HTTP client with the request timeout every adapter uses
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(crate::config::HTTP_TIMEOUT_SECS))
        .user_agent(concat!("buy_alerts/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
