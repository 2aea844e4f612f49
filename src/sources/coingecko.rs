use async_trait::async_trait;
use serde_json::Value;

use super::{http_client, MarketData, PriceOracle};
use crate::error::{PipelineError, Result};
use crate::types::TrackedAsset;

/// CoinGecko public API, used both as price oracle and market-data source
pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, url: &str) -> std::result::Result<Value, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("CoinGecko returned HTTP {}", status));
        }

        response.json::<Value>().await.map_err(|e| e.to_string())
    }
}

/// CoinGecko asset-platform id for a chain tag
fn platform_id(chain: &str) -> &str {
    match chain {
        "bsc" => "binance-smart-chain",
        "arbitrum" => "arbitrum-one",
        other => other,
    }
}

/// Pull `{asset: {usd: price}}` out of a `/simple/price` body
pub fn parse_spot_price(body: &Value, asset: &str) -> Option<f64> {
    body[asset]["usd"]
        .as_f64()
        .filter(|price| price.is_finite() && *price > 0.0)
}

/// Pull `market_data.market_cap.usd` out of a `/coins/.../contract/...` body,
/// defaulting to zero when CoinGecko has no figure
pub fn parse_market_cap(body: &Value) -> f64 {
    body["market_data"]["market_cap"]["usd"]
        .as_f64()
        .unwrap_or(0.0)
}

#[async_trait]
impl PriceOracle for CoinGeckoClient {
    async fn spot_price(&self, asset: &str) -> Result<f64> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, asset
        );

        let body = self
            .get_json(&url)
            .await
            .map_err(|reason| PipelineError::QuoteUnavailable {
                asset: asset.to_string(),
                reason,
            })?;

        parse_spot_price(&body, asset).ok_or_else(|| {
            log::warn!("⚠️  CoinGecko returned no usable price for {}: {}", asset, body);
            PipelineError::QuoteUnavailable {
                asset: asset.to_string(),
                reason: "missing or non-numeric usd price".to_string(),
            }
        })
    }
}

#[async_trait]
impl MarketData for CoinGeckoClient {
    async fn market_cap(&self, asset: &TrackedAsset) -> Result<f64> {
        let url = format!(
            "{}/coins/{}/contract/{}",
            self.base_url,
            platform_id(&asset.chain),
            asset.id
        );

        let body = self
            .get_json(&url)
            .await
            .map_err(|reason| PipelineError::FetchFailed {
                asset: asset.id.clone(),
                reason,
            })?;

        Ok(parse_market_cap(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineBreak;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn parses_spot_price() {
        let body = json!({ "ethereum": { "usd": 3000.5 } });
        assert_eq!(parse_spot_price(&body, "ethereum"), Some(3000.5));
        assert_eq!(parse_spot_price(&body, "solana"), None);
    }

    #[test]
    fn rejects_non_numeric_price() {
        let body = json!({ "ethereum": { "usd": "n/a" } });
        assert_eq!(parse_spot_price(&body, "ethereum"), None);
        let body = json!({ "ethereum": { "usd": 0.0 } });
        assert_eq!(parse_spot_price(&body, "ethereum"), None);
    }

    #[test]
    fn market_cap_defaults_to_zero() {
        let body = json!({ "market_data": { "market_cap": { "usd": 2500000000.0 } } });
        assert_eq!(parse_market_cap(&body), 2_500_000_000.0);
        assert_eq!(parse_market_cap(&json!({ "id": "pepe" })), 0.0);
    }

    #[tokio::test]
    async fn fetches_spot_price() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/simple/price")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ids".into(), "ethereum".into()),
                Matcher::UrlEncoded("vs_currencies".into(), "usd".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ethereum":{"usd":3000.0}}"#)
            .create_async()
            .await;

        let client = CoinGeckoClient::new(&server.url());
        assert_eq!(client.spot_price("ethereum").await.unwrap(), 3000.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_is_quote_unavailable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/simple/price")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error":"Rate limit exceeded"}"#)
            .create_async()
            .await;

        let client = CoinGeckoClient::new(&server.url());
        let err = client.spot_price("ethereum").await.unwrap_err();
        assert!(matches!(err, PipelineError::QuoteUnavailable { .. }));
    }

    #[tokio::test]
    async fn fetches_market_cap_for_platform() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/coins/binance-smart-chain/contract/0xabc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"market_data":{"market_cap":{"usd":45000000}}}"#)
            .create_async()
            .await;

        let asset = TrackedAsset {
            id: "0xabc".to_string(),
            chain: "bsc".to_string(),
            display_name: "CAKEY".to_string(),
            destination: "1".to_string(),
            line_break: LineBreak::Single,
        };
        let client = CoinGeckoClient::new(&server.url());
        assert_eq!(client.market_cap(&asset).await.unwrap(), 45_000_000.0);
        mock.assert_async().await;
    }
}
