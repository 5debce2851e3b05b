//! Decimal helpers for values scraped off venue order forms.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parse a displayed number, ignoring thousands separators, currency signs and
/// unit suffixes (e.g. `"$12,345.6"`, `"-0.250 BTC"`).
///
/// Returns `None` when nothing numeric is left.
pub fn parse_display_number(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned).ok()
}

/// Same as [`parse_display_number`] but counts unparsable input as zero.
pub fn parse_or_zero(raw: &str) -> Decimal {
    parse_display_number(raw).unwrap_or(Decimal::ZERO)
}

/// Format with exactly `decimals` fractional digits, padding with zeros.
pub fn format_fixed(value: Decimal, decimals: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_display_number() {
        assert_eq!(parse_display_number("0.5"), Some(dec!(0.5)));
        assert_eq!(parse_display_number("-0.250 BTC"), Some(dec!(-0.250)));
        assert_eq!(parse_display_number("$12,345.67"), Some(dec!(12345.67)));
        assert_eq!(parse_display_number("  1,000 "), Some(dec!(1000)));
    }

    #[test]
    fn test_unparsable_counts_as_zero() {
        assert_eq!(parse_display_number(""), None);
        assert_eq!(parse_display_number("--"), None);
        assert_eq!(parse_or_zero("n/a"), Decimal::ZERO);
        assert_eq!(parse_or_zero("1.2.3"), Decimal::ZERO);
    }

    #[test]
    fn test_format_fixed() {
        assert_eq!(format_fixed(dec!(0.2), 5), "0.20000");
        assert_eq!(format_fixed(dec!(1.234567), 5), "1.23457");
        assert_eq!(format_fixed(dec!(0.000005), 5), "0.00001");
        assert_eq!(format_fixed(dec!(3), 1), "3.0");
    }
}
