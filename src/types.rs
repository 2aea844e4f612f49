use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// One (token, posting destination) pairing to monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAsset {
    /// Token contract address (or mint), passed verbatim to the chain source
    pub id: String,
    /// Opaque chain tag, e.g. `ethereum`
    pub chain: String,
    pub display_name: String,
    /// Community id / channel the alerts for this asset are posted to
    pub destination: String,
    pub line_break: LineBreak,
}

impl TrackedAsset {
    /// Symbol of the chain's native asset, used in the alert headline
    pub fn native_symbol(&self) -> String {
        match self.chain.as_str() {
            "ethereum" | "base" | "arbitrum" => "ETH".to_string(),
            "bsc" => "BNB".to_string(),
            "solana" => "SOL".to_string(),
            other => other.to_uppercase(),
        }
    }

    /// Whether the chain uses 20-byte EVM addresses
    pub fn is_evm(&self) -> bool {
        matches!(self.chain.as_str(), "ethereum" | "bsc" | "base" | "arbitrum")
    }
}

/// How alert lines are joined for a destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineBreak {
    Single,
    #[default]
    Double,
}

impl LineBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineBreak::Single => "\n",
            LineBreak::Double => "\n\n",
        }
    }
}

/// A normalized transfer as produced by the buy fetcher
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub transfer_id: String,
    pub native_value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Raw entry as handed back by a chain source, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTransfer {
    /// Amount in base units, decimal string
    pub amount: Option<String>,
    pub id: Option<String>,
    /// Unix seconds
    pub timestamp: Option<i64>,
    pub decimals: Option<u32>,
}

/// What a chain source returned for one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainResponse {
    Records(Vec<RawTransfer>),
    /// Upstream answered, but with no result list (status flag off or non-array payload)
    NoResults { message: String },
}

/// A fiat spot price together with the instant it was fetched
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub asset: String,
    pub fiat_value: f64,
    pub fetched_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnouncementKey {
    pub destination: String,
    pub transfer_id: String,
}

impl AnnouncementKey {
    pub fn new(destination: &str, transfer_id: &str) -> Self {
        Self {
            destination: destination.to_string(),
            transfer_id: transfer_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub destination: String,
    pub text: String,
}

/// Identifier returned by a publisher for a delivered alert
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryId(pub String);

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters for one runner cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub assets_processed: usize,
    pub assets_failed: usize,
    pub alerts_published: usize,
    pub publish_failures: usize,
    pub already_announced: usize,
}

impl CycleReport {
    pub fn as_message(&self) -> String {
        format!(
            "cycle done: {} asset(s) ok, {} failed, {} alert(s) published, {} publish failure(s), {} already announced",
            self.assets_processed,
            self.assets_failed,
            self.alerts_published,
            self.publish_failures,
            self.already_announced
        )
    }
}
