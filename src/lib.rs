//! # Buy Alerts
//!
//! Polls token transfer feeds, keeps the buys whose fiat value clears a
//! threshold, and posts one formatted alert per new buy to the community
//! configured for that token.
//!
//! ## Features
//!
//! - Etherscan-style transfer polling per tracked token
//! - Cached, coalesced spot price lookups (CoinGecko)
//! - Per-destination de-duplication of announced transfers
//! - Publishing through the X API, a logged-in browser session, or the console
//! - Per-asset fault isolation: one failing token never stalls the others
//!
//! ## Example
//!
//! ```rust,no_run
//! use buy_alerts::{RunnerBuilder, TrackedAsset, LineBreak};
//! use buy_alerts::publish::ConsolePublisher;
//! use buy_alerts::sources::{CoinGeckoClient, EtherscanSource};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coingecko = Arc::new(CoinGeckoClient::new("https://api.coingecko.com/api/v3"));
//!
//!     let runner = RunnerBuilder::new()
//!         .asset(TrackedAsset {
//!             id: "0x6982508145454Ce325dDbE47a25d4ec3d2311933".to_string(),
//!             chain: "ethereum".to_string(),
//!             display_name: "PEPE".to_string(),
//!             destination: "1700000000000000001".to_string(),
//!             line_break: LineBreak::Double,
//!         })
//!         .chain_source(Arc::new(EtherscanSource::new("https://api.etherscan.io/v2/api", "KEY")))
//!         .price_oracle(coingecko.clone())
//!         .market_data(coingecko)
//!         .publisher(Arc::new(ConsolePublisher::new()))
//!         .min_fiat_value(3000.0)
//!         .sponsor("acme", Some("trade smarter"))
//!         .build()?;
//!
//!     runner.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod publish;
pub mod sources;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use crate::core::{BuyFetcher, DedupTracker, PriceCache, Runner};
pub use display::AlertFormatter;
pub use error::{PipelineError, Result};
pub use publish::Publisher;
pub use types::{Alert, CycleReport, DeliveryId, LineBreak, TrackedAsset, TransferRecord};

use config::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PRICE_TTL_SECS, DEFAULT_TOKEN_DECIMALS};
use sources::{ChainSource, MarketData, PriceOracle};

/// Builder for assembling a [`Runner`] from its collaborators
pub struct RunnerBuilder {
    assets: Vec<TrackedAsset>,
    chain_source: Option<Arc<dyn ChainSource>>,
    price_oracle: Option<Arc<dyn PriceOracle>>,
    market_data: Option<Arc<dyn MarketData>>,
    publisher: Option<Arc<dyn Publisher>>,
    dedup: Option<Arc<DedupTracker>>,
    min_fiat_value: f64,
    sponsor_handle: String,
    sponsor_phrase: Option<String>,
    poll_interval: Duration,
    price_ttl: Duration,
    default_decimals: u32,
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self {
            assets: Vec::new(),
            chain_source: None,
            price_oracle: None,
            market_data: None,
            publisher: None,
            dedup: None,
            min_fiat_value: 0.0,
            sponsor_handle: String::new(),
            sponsor_phrase: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            price_ttl: Duration::from_secs(DEFAULT_PRICE_TTL_SECS),
            default_decimals: DEFAULT_TOKEN_DECIMALS,
        }
    }

    /// Add one tracked asset; assets are processed in the order they are added
    pub fn asset(mut self, asset: TrackedAsset) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn assets(mut self, assets: impl IntoIterator<Item = TrackedAsset>) -> Self {
        self.assets.extend(assets);
        self
    }

    pub fn chain_source(mut self, source: Arc<dyn ChainSource>) -> Self {
        self.chain_source = Some(source);
        self
    }

    pub fn price_oracle(mut self, oracle: Arc<dyn PriceOracle>) -> Self {
        self.price_oracle = Some(oracle);
        self
    }

    /// Optional; without it alerts carry no market-cap line
    pub fn market_data(mut self, market_data: Arc<dyn MarketData>) -> Self {
        self.market_data = Some(market_data);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Share a dedup tracker with the caller. Defaults to a fresh unbounded one.
    pub fn dedup(mut self, dedup: Arc<DedupTracker>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    pub fn min_fiat_value(mut self, value: f64) -> Self {
        self.min_fiat_value = value;
        self
    }

    pub fn sponsor(mut self, handle: &str, phrase: Option<&str>) -> Self {
        self.sponsor_handle = handle.to_string();
        self.sponsor_phrase = phrase.map(str::to_string);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn price_ttl(mut self, ttl: Duration) -> Self {
        self.price_ttl = ttl;
        self
    }

    pub fn default_decimals(mut self, decimals: u32) -> Self {
        self.default_decimals = decimals;
        self
    }

    pub fn build(self) -> Result<Runner> {
        let chain_source = self
            .chain_source
            .ok_or_else(|| PipelineError::Config("a chain source is required".to_string()))?;
        let price_oracle = self
            .price_oracle
            .ok_or_else(|| PipelineError::Config("a price oracle is required".to_string()))?;
        let publisher = self
            .publisher
            .ok_or_else(|| PipelineError::Config("a publisher is required".to_string()))?;

        if self.assets.is_empty() {
            return Err(PipelineError::Config("at least one tracked asset is required".to_string()));
        }
        if !self.min_fiat_value.is_finite() || self.min_fiat_value < 0.0 {
            return Err(PipelineError::Config(format!(
                "threshold must be a non-negative number, got {}",
                self.min_fiat_value
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(PipelineError::Config("poll interval must be positive".to_string()));
        }

        Ok(Runner::new(
            self.assets,
            BuyFetcher::new(chain_source).with_default_decimals(self.default_decimals),
            Arc::new(PriceCache::with_ttl(price_oracle, self.price_ttl)),
            self.market_data,
            self.dedup.unwrap_or_default(),
            AlertFormatter::new(&self.sponsor_handle, self.sponsor_phrase.as_deref()),
            publisher,
            self.min_fiat_value,
            self.poll_interval,
        ))
    }
}
