use chrono::{DateTime, Utc};
use ethers::{types::U256, utils::format_units};
use std::sync::Arc;

use crate::config::DEFAULT_TOKEN_DECIMALS;
use crate::error::Result;
use crate::sources::ChainSource;
use crate::types::{ChainResponse, RawTransfer, TrackedAsset, TransferRecord};

/// Queries the chain source for one tracked asset and normalizes the answer
pub struct BuyFetcher {
    source: Arc<dyn ChainSource>,
    default_decimals: u32,
}

impl BuyFetcher {
    pub fn new(source: Arc<dyn ChainSource>) -> Self {
        Self {
            source,
            default_decimals: DEFAULT_TOKEN_DECIMALS,
        }
    }

    pub fn with_default_decimals(mut self, decimals: u32) -> Self {
        self.default_decimals = decimals;
        self
    }

    pub async fn fetch_buys(&self, asset: &TrackedAsset) -> Result<Vec<TransferRecord>> {
        match self.source.token_transfers(asset).await? {
            ChainResponse::NoResults { message } => {
                tracing::warn!(
                    asset = %asset.id,
                    name = %asset.display_name,
                    "⚠️  chain source returned no transfer list: {}",
                    message
                );
                Ok(Vec::new())
            }
            ChainResponse::Records(raw) => {
                let total = raw.len();
                let records: Vec<TransferRecord> = raw
                    .iter()
                    .filter_map(|entry| self.normalize(entry))
                    .collect();

                if records.len() < total {
                    tracing::debug!(
                        asset = %asset.id,
                        dropped = total - records.len(),
                        "discarded malformed transfer entries"
                    );
                }
                Ok(records)
            }
        }
    }

    /// Validate one raw entry and scale its base-unit amount
    fn normalize(&self, entry: &RawTransfer) -> Option<TransferRecord> {
        let transfer_id = entry.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        let amount = entry.amount.as_deref().map(str::trim).filter(|a| !a.is_empty())?;
        let decimals = entry.decimals.unwrap_or(self.default_decimals);

        let native_value = scale_base_units(amount, decimals)?;
        let timestamp = entry
            .timestamp
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        Some(TransferRecord {
            transfer_id: transfer_id.to_string(),
            native_value,
            timestamp,
        })
    }
}

/// `"1234500000000000000"` with 18 decimals → `1.2345`
pub fn scale_base_units(amount: &str, decimals: u32) -> Option<f64> {
    let raw = U256::from_dec_str(amount).ok()?;
    let formatted = format_units(raw, decimals).ok()?;
    formatted.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::types::LineBreak;
    use async_trait::async_trait;

    struct StaticSource(std::result::Result<ChainResponse, String>);

    #[async_trait]
    impl ChainSource for StaticSource {
        async fn token_transfers(&self, asset: &TrackedAsset) -> Result<ChainResponse> {
            self.0.clone().map_err(|reason| PipelineError::FetchFailed {
                asset: asset.id.clone(),
                reason,
            })
        }
    }

    fn asset() -> TrackedAsset {
        TrackedAsset {
            id: "0x6982508145454ce325ddbe47a25d4ec3d2311933".to_string(),
            chain: "ethereum".to_string(),
            display_name: "PEPE".to_string(),
            destination: "1".to_string(),
            line_break: LineBreak::Double,
        }
    }

    fn raw(id: Option<&str>, amount: Option<&str>) -> RawTransfer {
        RawTransfer {
            amount: amount.map(str::to_string),
            id: id.map(str::to_string),
            timestamp: Some(1_700_000_000),
            decimals: None,
        }
    }

    #[test]
    fn scales_by_decimal_exponent() {
        assert_eq!(scale_base_units("1234500000000000000", 18), Some(1.2345));
        assert_eq!(scale_base_units("500000", 6), Some(0.5));
        assert_eq!(scale_base_units("0", 18), Some(0.0));
        assert_eq!(scale_base_units("12abc", 18), None);
        assert_eq!(scale_base_units("-5", 18), None);
    }

    #[tokio::test]
    async fn discards_malformed_entries() {
        let source = StaticSource(Ok(ChainResponse::Records(vec![
            raw(Some("0xaa"), Some("1234500000000000000")),
            raw(None, Some("1000000000000000000")),
            raw(Some("0xbb"), None),
            raw(Some("0xcc"), Some("not-a-number")),
            raw(Some("   "), Some("1")),
        ])));
        let fetcher = BuyFetcher::new(Arc::new(source));

        let records = fetcher.fetch_buys(&asset()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transfer_id, "0xaa");
        assert_eq!(records[0].native_value, 1.2345);
        assert_eq!(records[0].timestamp.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn uses_entry_decimals_over_default() {
        let mut entry = raw(Some("0xaa"), Some("2500000"));
        entry.decimals = Some(6);
        let source = StaticSource(Ok(ChainResponse::Records(vec![entry])));
        let fetcher = BuyFetcher::new(Arc::new(source)).with_default_decimals(18);

        let records = fetcher.fetch_buys(&asset()).await.unwrap();
        assert_eq!(records[0].native_value, 2.5);
    }

    #[tokio::test]
    async fn no_results_is_empty_not_error() {
        let source = StaticSource(Ok(ChainResponse::NoResults {
            message: "No transactions found".to_string(),
        }));
        let fetcher = BuyFetcher::new(Arc::new(source));
        assert!(fetcher.fetch_buys(&asset()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn propagates_fetch_failures() {
        let source = StaticSource(Err("timeout".to_string()));
        let fetcher = BuyFetcher::new(Arc::new(source));
        let err = fetcher.fetch_buys(&asset()).await.unwrap_err();
        assert!(matches!(err, PipelineError::FetchFailed { .. }));
    }
}
