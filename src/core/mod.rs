pub mod buy_fetcher;
pub mod dedup;
pub mod price_cache;
pub mod runner;
pub mod threshold;

pub use buy_fetcher::BuyFetcher;
pub use dedup::DedupTracker;
pub use price_cache::PriceCache;
pub use runner::Runner;
