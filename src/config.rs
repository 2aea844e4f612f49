use anyhow::{anyhow, Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::types::{LineBreak, TrackedAsset};

// Upstream endpoints
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const X_API_URL: &str = "https://api.twitter.com";
pub const X_WEB_URL: &str = "https://x.com";
pub const WEBDRIVER_URL: &str = "http://localhost:4444";

// Defaults
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PRICE_TTL_SECS: u64 = 60;
pub const DEFAULT_SETTLE_MILLIS: u64 = 3000;
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;
/// Most recent transfers requested per poll
pub const TRANSFER_PAGE_SIZE: u32 = 100;
pub const HTTP_TIMEOUT_SECS: u64 = 10;

// Process exit codes
pub const EXIT_STARTUP_ERROR: i32 = 1;
pub const EXIT_SESSION_AUTH_FAILED: i32 = 2;
pub const EXIT_SESSION_EXPIRED: i32 = 3;

/// CSS selectors for the X web UI. These track the live page markup and
/// break whenever X reshuffles its test ids.
pub mod selectors {
    pub const LOGIN_USERNAME: &str = "input[name=\"text\"]";
    pub const LOGIN_PASSWORD: &str = "input[name=\"password\"]";
    pub const HOME_TIMELINE: &str = "[data-testid=\"primaryColumn\"]";
    pub const COMPOSER: &str = "[data-testid=\"tweetTextarea_0\"]";
    pub const POST_BUTTON: &str = "[data-testid=\"tweetButtonInline\"]";
}

/// CoinGecko id of the asset transfers on a chain are settled in
pub fn settlement_asset(chain: &str) -> &'static str {
    match chain {
        "bsc" => "binancecoin",
        "solana" => "solana",
        _ => "ethereum",
    }
}

/// Which publisher backend the binary wires into the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherKind {
    Api,
    Session,
    Console,
}

impl FromStr for PublisherKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "api" => Ok(PublisherKind::Api),
            "session" | "browser" => Ok(PublisherKind::Session),
            "console" | "dry-run" => Ok(PublisherKind::Console),
            other => Err(anyhow!("Unknown PUBLISHER '{}' (expected api, session or console)", other)),
        }
    }
}

impl PublisherKind {
    pub fn as_str(&self) -> &str {
        match self {
            PublisherKind::Api => "X API",
            PublisherKind::Session => "X web session",
            PublisherKind::Console => "console (dry run)",
        }
    }
}

#[derive(Debug, Clone)]
pub struct XApiCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub username: String,
    pub password: String,
}

/// `config.json` as written by operators
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub communities: Vec<Community>,
    pub eth_usd_threshold: f64,
    pub sponsor_handle: String,
    #[serde(default)]
    pub sponsor_phrase: Option<String>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub price_ttl_secs: Option<u64>,
    #[serde(default)]
    pub settle_millis: Option<u64>,
    #[serde(default)]
    pub dedup_capacity: Option<usize>,
    #[serde(default)]
    pub line_break: Option<LineBreak>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub slug: String,
    pub token: TokenEntry,
    #[serde(default)]
    pub line_break: Option<LineBreak>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    pub name: String,
    pub address: String,
    #[serde(default = "default_chain")]
    pub chain: String,
}

fn default_chain() -> String {
    "ethereum".to_string()
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub assets: Vec<TrackedAsset>,
    pub min_fiat_value: f64,
    pub sponsor_handle: String,
    pub sponsor_phrase: Option<String>,
    pub poll_interval: Duration,
    pub price_ttl: Duration,
    pub settle: Duration,
    pub dedup_capacity: Option<usize>,
    pub publisher: PublisherKind,
    pub etherscan_api_key: String,
    pub etherscan_url: String,
    pub coingecko_url: String,
    pub x_api_url: String,
    pub x_web_url: String,
    pub webdriver_url: String,
    pub x_api: Option<XApiCredentials>,
    pub session: Option<SessionCredentials>,
}

impl AppConfig {
    /// Load `.env`, then `config.json` (or `CONFIG_PATH`), then apply environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string());
        let raw = std::fs::read_to_string(Path::new(&path))
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_sources(&raw, |key| env::var(key).ok())
    }

    /// Build from a JSON document and an environment lookup
    pub fn from_sources<F>(json: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = serde_json::from_str(json).context("config.json is not valid")?;
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let min_fiat_value = match var("ETH_THRESHOLD") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| anyhow!("ETH_THRESHOLD must be a number, got '{}'", raw))?,
            None => file.eth_usd_threshold,
        };
        if !min_fiat_value.is_finite() || min_fiat_value < 0.0 {
            return Err(anyhow!("Threshold must be a non-negative number"));
        }

        let secs = |key: &str, from_file: Option<u64>, default: u64| -> Result<u64> {
            match var(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow!("{} must be a whole number of seconds", key)),
                None => Ok(from_file.unwrap_or(default)),
            }
        };
        let poll_interval_secs = secs("POLL_INTERVAL_SECS", file.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_interval_secs == 0 {
            return Err(anyhow!("Polling interval must be at least one second"));
        }
        let price_ttl_secs = secs("PRICE_TTL_SECS", file.price_ttl_secs, DEFAULT_PRICE_TTL_SECS)?;

        let assets = build_assets(&file)?;

        let publisher = match var("PUBLISHER") {
            Some(raw) => raw.parse()?,
            None => PublisherKind::Api,
        };

        let x_api = match (
            var("TWITTER_API_KEY"),
            var("TWITTER_API_SECRET"),
            var("TWITTER_ACCESS_TOKEN"),
            var("TWITTER_ACCESS_SECRET"),
        ) {
            (Some(api_key), Some(api_secret), Some(access_token), Some(access_secret)) => {
                Some(XApiCredentials {
                    api_key,
                    api_secret,
                    access_token,
                    access_secret,
                })
            }
            _ => None,
        };
        let session = match (var("X_USERNAME"), var("X_PASSWORD")) {
            (Some(username), Some(password)) => Some(SessionCredentials { username, password }),
            _ => None,
        };

        match publisher {
            PublisherKind::Api if x_api.is_none() => {
                return Err(anyhow!(
                    "PUBLISHER=api needs TWITTER_API_KEY, TWITTER_API_SECRET, TWITTER_ACCESS_TOKEN and TWITTER_ACCESS_SECRET"
                ))
            }
            PublisherKind::Session if session.is_none() => {
                return Err(anyhow!("PUBLISHER=session needs X_USERNAME and X_PASSWORD"))
            }
            _ => {}
        }

        Ok(Self {
            assets,
            min_fiat_value,
            sponsor_handle: file.sponsor_handle.trim_start_matches('@').to_string(),
            sponsor_phrase: file.sponsor_phrase.filter(|p| !p.trim().is_empty()),
            poll_interval: Duration::from_secs(poll_interval_secs),
            price_ttl: Duration::from_secs(price_ttl_secs),
            settle: Duration::from_millis(file.settle_millis.unwrap_or(DEFAULT_SETTLE_MILLIS)),
            dedup_capacity: file.dedup_capacity.filter(|c| *c > 0),
            publisher,
            etherscan_api_key: var("ETHERSCAN_API_KEY").unwrap_or_default(),
            etherscan_url: var("ETHERSCAN_API_URL").unwrap_or_else(|| ETHERSCAN_API_URL.to_string()),
            coingecko_url: var("COINGECKO_API_URL").unwrap_or_else(|| COINGECKO_API_URL.to_string()),
            x_api_url: var("X_API_URL").unwrap_or_else(|| X_API_URL.to_string()),
            x_web_url: var("X_WEB_URL").unwrap_or_else(|| X_WEB_URL.to_string()),
            webdriver_url: var("WEBDRIVER_URL").unwrap_or_else(|| WEBDRIVER_URL.to_string()),
            x_api,
            session,
        })
    }
}

fn build_assets(file: &FileConfig) -> Result<Vec<TrackedAsset>> {
    if file.communities.is_empty() {
        return Err(anyhow!("config.json must list at least one community"));
    }

    file.communities
        .iter()
        .map(|community| {
            let address = community.token.address.trim();
            if address.is_empty() {
                return Err(anyhow!("Token '{}' has an empty address", community.token.name));
            }
            let asset = TrackedAsset {
                id: address.to_string(),
                chain: community.token.chain.trim().to_lowercase(),
                display_name: community.token.name.clone(),
                destination: community.slug.clone(),
                line_break: community
                    .line_break
                    .or(file.line_break)
                    .unwrap_or_default(),
            };
            if asset.is_evm() {
                Address::from_str(address).map_err(|e| {
                    anyhow!("Token '{}' has an invalid address {}: {}", asset.display_name, address, e)
                })?;
            }
            Ok(asset)
        })
        .collect()
}
