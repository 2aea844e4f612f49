use crate::core::threshold::fiat_value;
use crate::types::{TrackedAsset, TransferRecord};

/// Renders qualifying transfers into alert text.
///
/// The sponsor line is built once at construction and appended to every
/// alert unchanged.
#[derive(Debug, Clone)]
pub struct AlertFormatter {
    sponsor_line: String,
}

impl AlertFormatter {
    pub fn new(sponsor_handle: &str, sponsor_phrase: Option<&str>) -> Self {
        let handle = sponsor_handle.trim_start_matches('@');
        let sponsor_line = match sponsor_phrase.map(str::trim).filter(|p| !p.is_empty()) {
            Some(phrase) => format!("Sponsored by: @{} – {}", handle, phrase),
            None => format!("Sponsored by: @{}", handle),
        };
        Self { sponsor_line }
    }

    pub fn sponsor_line(&self) -> &str {
        &self.sponsor_line
    }

    pub fn format(
        &self,
        asset: &TrackedAsset,
        transfer: &TransferRecord,
        fiat_price: f64,
        market_cap: Option<f64>,
    ) -> String {
        let mut lines = Vec::with_capacity(4);

        lines.push(format!(
            "🔥 Bought {:.4} {} of **{}** (${:.2})",
            transfer.native_value,
            asset.native_symbol(),
            asset.display_name,
            fiat_value(transfer, fiat_price)
        ));

        if let Some(cap) = market_cap {
            lines.push(format!("💰 Market Cap: {}", format_market_cap(cap)));
        }

        lines.push(format!(
            "🔗 Chart: https://dexscreener.com/{}/{}",
            asset.chain, asset.id
        ));
        lines.push(self.sponsor_line.clone());

        lines.join(asset.line_break.as_str())
    }
}

/// `$2.50B`, `$45.00M`, or a comma-grouped whole-dollar figure below a million
pub fn format_market_cap(cap: f64) -> String {
    if cap >= 1e9 {
        format!("${:.2}B", cap / 1e9)
    } else if cap >= 1e6 {
        format!("${:.2}M", cap / 1e6)
    } else {
        format!("${}", group_thousands(cap.max(0.0).round() as u64))
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineBreak;
    use chrono::{TimeZone, Utc};

    fn asset(line_break: LineBreak) -> TrackedAsset {
        TrackedAsset {
            id: "0x6982508145454ce325ddbe47a25d4ec3d2311933".to_string(),
            chain: "ethereum".to_string(),
            display_name: "PEPE".to_string(),
            destination: "1700000000000000001".to_string(),
            line_break,
        }
    }

    fn transfer() -> TransferRecord {
        TransferRecord {
            transfer_id: "0xaa".to_string(),
            native_value: 1.2345,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn abbreviates_market_caps() {
        assert_eq!(format_market_cap(2_500_000_000.0), "$2.50B");
        assert_eq!(format_market_cap(45_000_000.0), "$45.00M");
        assert_eq!(format_market_cap(900.0), "$900");
        assert_eq!(format_market_cap(1_000_000.0), "$1.00M");
        assert_eq!(format_market_cap(999_999.0), "$999,999");
        assert_eq!(format_market_cap(12_345.0), "$12,345");
        assert_eq!(format_market_cap(0.0), "$0");
    }

    #[test]
    fn renders_all_lines_in_order() {
        let formatter = AlertFormatter::new("acme", Some("trade smarter"));
        let text = formatter.format(
            &asset(LineBreak::Double),
            &transfer(),
            3000.0,
            Some(2_500_000_000.0),
        );

        assert_eq!(
            text,
            "🔥 Bought 1.2345 ETH of **PEPE** ($3703.50)\n\n\
             💰 Market Cap: $2.50B\n\n\
             🔗 Chart: https://dexscreener.com/ethereum/0x6982508145454ce325ddbe47a25d4ec3d2311933\n\n\
             Sponsored by: @acme – trade smarter"
        );
    }

    #[test]
    fn omits_market_cap_and_uses_single_breaks() {
        let formatter = AlertFormatter::new("@acme", None);
        let text = formatter.format(&asset(LineBreak::Single), &transfer(), 3000.0, None);

        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("🔥 Bought 1.2345 ETH"));
        assert!(lines[1].starts_with("🔗 Chart:"));
        assert_eq!(lines[2], "Sponsored by: @acme");
    }

    #[test]
    fn is_deterministic() {
        let formatter = AlertFormatter::new("acme", Some("gm"));
        let a = formatter.format(&asset(LineBreak::Double), &transfer(), 3000.0, Some(900.0));
        let b = formatter.format(&asset(LineBreak::Double), &transfer(), 3000.0, Some(900.0));
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn blank_phrase_is_ignored() {
        let formatter = AlertFormatter::new("acme", Some("   "));
        assert_eq!(formatter.sponsor_line(), "Sponsored by: @acme");
    }
}
