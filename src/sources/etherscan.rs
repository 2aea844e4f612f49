use async_trait::async_trait;
use serde_json::Value;

use super::{http_client, ChainSource};
use crate::config::TRANSFER_PAGE_SIZE;
use crate::error::{PipelineError, Result};
use crate::types::{ChainResponse, RawTransfer, TrackedAsset};

/// Etherscan multichain API (`module=account&action=tokentx`)
pub struct EtherscanSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EtherscanSource {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

/// Etherscan chain id for a chain tag
fn chain_id(chain: &str) -> Option<u64> {
    match chain {
        "ethereum" => Some(1),
        "bsc" => Some(56),
        "base" => Some(8453),
        "arbitrum" => Some(42161),
        _ => None,
    }
}

#[async_trait]
impl ChainSource for EtherscanSource {
    async fn token_transfers(&self, asset: &TrackedAsset) -> Result<ChainResponse> {
        let fetch_failed = |reason: String| PipelineError::FetchFailed {
            asset: asset.id.clone(),
            reason,
        };

        let chain_id = chain_id(&asset.chain)
            .ok_or_else(|| fetch_failed(format!("chain '{}' is not served by Etherscan", asset.chain)))?
            .to_string();
        let offset = TRANSFER_PAGE_SIZE.to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "account"),
                ("action", "tokentx"),
                ("contractaddress", asset.id.as_str()),
                ("sort", "desc"),
                ("page", "1"),
                ("offset", offset.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("Etherscan returned HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| fetch_failed(format!("undecodable Etherscan body: {}", e)))?;

        let parsed = parse_tokentx(&body);
        if let ChainResponse::Records(records) = &parsed {
            log::debug!("📥 Etherscan returned {} transfer(s) for {}", records.len(), asset.id);
        }
        Ok(parsed)
    }
}

/// Map a `tokentx` body to raw transfers. Field validation is left to the
/// buy fetcher; entries are only unpacked here.
pub fn parse_tokentx(body: &Value) -> ChainResponse {
    let message = body["message"].as_str().unwrap_or("no message").to_string();

    if body["status"].as_str() != Some("1") {
        let detail = body["result"].as_str().unwrap_or_default();
        return ChainResponse::NoResults {
            message: if detail.is_empty() {
                message
            } else {
                format!("{} ({})", message, detail)
            },
        };
    }

    let Some(entries) = body["result"].as_array() else {
        return ChainResponse::NoResults { message };
    };

    let records = entries
        .iter()
        .map(|tx| RawTransfer {
            amount: tx["value"].as_str().map(str::to_string),
            id: tx["hash"].as_str().map(str::to_string),
            timestamp: tx["timeStamp"].as_str().and_then(|t| t.parse().ok()),
            decimals: tx["tokenDecimal"].as_str().and_then(|d| d.parse().ok()),
        })
        .collect();

    ChainResponse::Records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineBreak;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn pepe() -> TrackedAsset {
        TrackedAsset {
            id: "0x6982508145454ce325ddbe47a25d4ec3d2311933".to_string(),
            chain: "ethereum".to_string(),
            display_name: "PEPE".to_string(),
            destination: "1700000000000000001".to_string(),
            line_break: LineBreak::Double,
        }
    }

    #[test]
    fn unpacks_result_entries() {
        let body = json!({
            "status": "1",
            "message": "OK",
            "result": [
                { "hash": "0xaa", "value": "1234500000000000000", "timeStamp": "1700000000", "tokenDecimal": "18" },
                { "hash": "0xbb", "timeStamp": "1700000001" }
            ]
        });

        let ChainResponse::Records(records) = parse_tokentx(&body) else {
            panic!("expected records");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_deref(), Some("0xaa"));
        assert_eq!(records[0].amount.as_deref(), Some("1234500000000000000"));
        assert_eq!(records[0].timestamp, Some(1_700_000_000));
        assert_eq!(records[0].decimals, Some(18));
        assert_eq!(records[1].amount, None);
    }

    #[test]
    fn status_zero_is_no_results() {
        let body = json!({ "status": "0", "message": "No transactions found", "result": [] });
        assert_eq!(
            parse_tokentx(&body),
            ChainResponse::NoResults {
                message: "No transactions found".to_string()
            }
        );

        let body = json!({ "status": "0", "message": "NOTOK", "result": "Invalid API Key" });
        match parse_tokentx(&body) {
            ChainResponse::NoResults { message } => assert!(message.contains("Invalid API Key")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn non_array_result_is_no_results() {
        let body = json!({ "status": "1", "message": "OK", "result": "rate limited" });
        assert!(matches!(parse_tokentx(&body), ChainResponse::NoResults { .. }));
    }

    #[tokio::test]
    async fn queries_tokentx_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("chainid".into(), "1".into()),
                Matcher::UrlEncoded("action".into(), "tokentx".into()),
                Matcher::UrlEncoded(
                    "contractaddress".into(),
                    "0x6982508145454ce325ddbe47a25d4ec3d2311933".into(),
                ),
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("offset".into(), TRANSFER_PAGE_SIZE.to_string()),
                Matcher::UrlEncoded("apikey".into(), "KEY".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"1","message":"OK","result":[{"hash":"0xaa","value":"1","timeStamp":"1700000000"}]}"#)
            .create_async()
            .await;

        let source = EtherscanSource::new(&format!("{}/v2/api", server.url()), "KEY");
        let response = source.token_transfers(&pepe()).await.unwrap();

        assert!(matches!(response, ChainResponse::Records(ref r) if r.len() == 1));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_error_is_fetch_failed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let source = EtherscanSource::new(&format!("{}/v2/api", server.url()), "KEY");
        let err = source.token_transfers(&pepe()).await.unwrap_err();
        assert!(matches!(err, PipelineError::FetchFailed { .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_fetch_failed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let source = EtherscanSource::new(&format!("{}/v2/api", server.url()), "KEY");
        let err = source.token_transfers(&pepe()).await.unwrap_err();
        assert!(matches!(err, PipelineError::FetchFailed { .. }));
    }

    #[tokio::test]
    async fn unsupported_chain_is_fetch_failed() {
        let source = EtherscanSource::new("http://127.0.0.1:9", "KEY");
        let mut asset = pepe();
        asset.chain = "solana".to_string();
        let err = source.token_transfers(&asset).await.unwrap_err();
        assert!(err.to_string().contains("solana"));
    }
}
