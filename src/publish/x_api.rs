use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{digest::InvalidLength, Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{json, Value};
use sha1::Sha1;

use super::Publisher;
use crate::config::XApiCredentials;
use crate::error::{PipelineError, Result};
use crate::sources::http_client;
use crate::types::DeliveryId;

/// RFC 3986 unreserved characters stay as-is, everything else is escaped
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE).to_string()
}

/// Posts alerts through `POST /2/tweets` with OAuth 1.0a user-context signing
pub struct XApiPublisher {
    client: reqwest::Client,
    base_url: String,
    credentials: XApiCredentials,
}

impl XApiPublisher {
    pub fn new(base_url: &str, credentials: XApiCredentials) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn authorization(&self, url: &str) -> std::result::Result<String, InvalidLength> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        oauth_header("POST", url, &[], &self.credentials, &nonce, &timestamp)
    }
}

/// HMAC-SHA1 signature over the OAuth base string.
///
/// `params` are the oauth and query/form parameters that take part in
/// signing; JSON bodies do not.
pub fn oauth_signature(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    consumer_secret: &str,
    token_secret: &str,
) -> std::result::Result<String, InvalidLength> {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&param_string)
    );
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));

    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())?;
    mac.update(base.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Full `Authorization: OAuth ...` header value
pub fn oauth_header(
    method: &str,
    url: &str,
    extra_params: &[(&str, &str)],
    credentials: &XApiCredentials,
    nonce: &str,
    timestamp: &str,
) -> std::result::Result<String, InvalidLength> {
    let oauth_params = [
        ("oauth_consumer_key", credentials.api_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let mut signed: Vec<(&str, &str)> = oauth_params.to_vec();
    signed.extend_from_slice(extra_params);
    let signature = oauth_signature(
        method,
        url,
        &signed,
        &credentials.api_secret,
        &credentials.access_secret,
    )?;

    let mut fields: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
        .collect();
    fields.push(format!("oauth_signature=\"{}\"", encode(&signature)));
    fields.sort();

    Ok(format!("OAuth {}", fields.join(", ")))
}

#[async_trait]
impl Publisher for XApiPublisher {
    fn name(&self) -> &str {
        "x-api"
    }

    async fn publish(&self, destination: &str, text: &str) -> Result<DeliveryId> {
        let failed = |reason: String| PipelineError::PublishFailed {
            destination: destination.to_string(),
            reason,
        };

        let url = format!("{}/2/tweets", self.base_url);
        let authorization = self
            .authorization(&url)
            .map_err(|e| failed(format!("cannot sign request: {}", e)))?;
        let mut body = json!({ "text": text });
        if !destination.is_empty() {
            body["community_id"] = json!(destination);
        }

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(failed(format!("X API returned HTTP {}: {}", status, error_text)));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| failed(format!("undecodable X API body: {}", e)))?;

        payload["data"]["id"]
            .as_str()
            .map(|id| DeliveryId(id.to_string()))
            .ok_or_else(|| failed(format!("X API response carried no post id: {}", payload)))
    }
}
