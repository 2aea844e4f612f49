pub mod formatter;

pub use formatter::{format_market_cap, AlertFormatter};
