use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::settlement_asset;
use crate::core::{threshold, BuyFetcher, DedupTracker, PriceCache};
use crate::display::AlertFormatter;
use crate::error::Result;
use crate::publish::Publisher;
use crate::sources::MarketData;
use crate::types::{Alert, CycleReport, TrackedAsset};

/// Outcome of one asset's pass through the pipeline
#[derive(Debug, Default)]
struct AssetOutcome {
    published: usize,
    publish_failures: usize,
    already_announced: usize,
}

/// Drives poll → filter → dedup → format → publish for every tracked asset
pub struct Runner {
    assets: Vec<TrackedAsset>,
    fetcher: BuyFetcher,
    prices: Arc<PriceCache>,
    market_data: Option<Arc<dyn MarketData>>,
    dedup: Arc<DedupTracker>,
    formatter: AlertFormatter,
    publisher: Arc<dyn Publisher>,
    min_fiat_value: f64,
    poll_interval: Duration,
    busy: AtomicBool,
}

impl Runner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assets: Vec<TrackedAsset>,
        fetcher: BuyFetcher,
        prices: Arc<PriceCache>,
        market_data: Option<Arc<dyn MarketData>>,
        dedup: Arc<DedupTracker>,
        formatter: AlertFormatter,
        publisher: Arc<dyn Publisher>,
        min_fiat_value: f64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            assets,
            fetcher,
            prices,
            market_data,
            dedup,
            formatter,
            publisher,
            min_fiat_value,
            poll_interval,
            busy: AtomicBool::new(false),
        }
    }

    pub fn assets(&self) -> &[TrackedAsset] {
        &self.assets
    }

    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Run cycles until `cancel` fires: one immediately, then every poll interval.
    ///
    /// Returns `Err` only for a fatal session fault.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            assets = self.assets.len(),
            interval_secs = self.poll_interval.as_secs(),
            publisher = self.publisher.name(),
            "🚀 buy tracker started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("🛑 buy tracker stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.try_run_cycle().await?;
                }
            }
        }
    }

    /// Run a cycle unless one is already in progress.
    ///
    /// `Ok(None)` means the cycle was skipped because the previous one is still running.
    pub async fn try_run_cycle(&self) -> Result<Option<CycleReport>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("⏭️  previous cycle still running, skipping this tick");
            return Ok(None);
        }

        let _busy = BusyGuard(&self.busy);
        self.run_cycle().await.map(Some)
    }

    /// One pass over every tracked asset. Per-asset errors are logged and the
    /// cycle moves on; only a fatal session error aborts it.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        tracing::info!("⏱ tracker run at {}", chrono::Utc::now().to_rfc3339());
        let mut report = CycleReport::default();

        for asset in &self.assets {
            match self.process_asset(asset).await {
                Ok(outcome) => {
                    report.assets_processed += 1;
                    report.alerts_published += outcome.published;
                    report.publish_failures += outcome.publish_failures;
                    report.already_announced += outcome.already_announced;
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(
                        asset = %asset.id,
                        destination = %asset.destination,
                        "❌ fatal error while processing {}: {}",
                        asset.display_name,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    report.assets_failed += 1;
                    tracing::error!(
                        asset = %asset.id,
                        destination = %asset.destination,
                        "❌ error processing {}: {}",
                        asset.display_name,
                        e
                    );
                }
            }
        }

        tracing::info!("{}", report.as_message());
        Ok(report)
    }

    async fn process_asset(&self, asset: &TrackedAsset) -> Result<AssetOutcome> {
        tracing::info!(asset = %asset.id, chain = %asset.chain, "⏳ checking {}", asset.display_name);
        let mut outcome = AssetOutcome::default();

        let buys = self.fetcher.fetch_buys(asset).await?;
        if buys.is_empty() {
            return Ok(outcome);
        }

        let price = self.prices.get_price(settlement_asset(&asset.chain)).await?;
        let large_buys = threshold::filter(buys, price, self.min_fiat_value);
        tracing::info!(
            asset = %asset.id,
            "✅ {} buy(s) ≥ ${}",
            large_buys.len(),
            self.min_fiat_value
        );

        // One tx can emit several transfer logs under the same hash
        let mut batch = HashSet::new();
        let fresh: Vec<_> = large_buys
            .into_iter()
            .filter(|b| {
                let seen = self.dedup.is_announced(&asset.destination, &b.transfer_id);
                if seen {
                    outcome.already_announced += 1;
                }
                !seen && batch.insert(b.transfer_id.clone())
            })
            .collect();
        if fresh.is_empty() {
            return Ok(outcome);
        }

        let market_cap = self.market_cap(asset).await;

        for buy in fresh {
            let alert = Alert {
                destination: asset.destination.clone(),
                text: self.formatter.format(asset, &buy, price, market_cap),
            };
            tracing::debug!(
                destination = %alert.destination,
                "📝 posting: {}",
                alert.text.replace('\n', " | ")
            );

            match self.publisher.publish(&alert.destination, &alert.text).await {
                Ok(delivery) => {
                    self.dedup.mark_announced(&alert.destination, &buy.transfer_id);
                    outcome.published += 1;
                    tracing::info!(
                        destination = %alert.destination,
                        transfer = %buy.transfer_id,
                        delivery = %delivery,
                        "↪️  alert published via {}",
                        self.publisher.name()
                    );
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    outcome.publish_failures += 1;
                    tracing::error!(
                        destination = %alert.destination,
                        transfer = %buy.transfer_id,
                        "❌ alert dropped: {}",
                        e
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// Optional enrichment; a failed lookup only drops the market-cap line
    async fn market_cap(&self, asset: &TrackedAsset) -> Option<f64> {
        let source = self.market_data.as_ref()?;
        match source.market_cap(asset).await {
            Ok(cap) => Some(cap),
            Err(e) => {
                tracing::warn!(asset = %asset.id, "⚠️  failed to fetch market cap: {}", e);
                None
            }
        }
    }
}

/// Clears the busy flag even when the cycle future is dropped mid-flight
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("assets", &self.assets.len())
            .field("publisher", &self.publisher.name())
            .field("min_fiat_value", &self.min_fiat_value)
            .field("poll_interval", &self.poll_interval)
            .field("busy", &self.is_busy())
            .finish()
    }
}
