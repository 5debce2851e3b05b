//! Core types shared by venue adapters and controllers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::decimal::parse_or_zero;

/// One of the two trading surfaces being coordinated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Lighter,
    Variational,
}

impl Venue {
    /// Both venues, in the order positions are summed.
    pub const ALL: [Venue; 2] = [Venue::Lighter, Venue::Variational];
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Lighter => write!(f, "Lighter"),
            Venue::Variational => write!(f, "Variational"),
        }
    }
}

impl FromStr for Venue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lighter" | "l" => Ok(Venue::Lighter),
            "variational" | "v" => Ok(Venue::Variational),
            other => anyhow::bail!("unknown venue '{}'", other),
        }
    }
}

/// Order direction as selected on a venue's order form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Direction that reduces the given signed exposure.
    ///
    /// Positive (net long) exposure is reduced by selling; zero or negative by buying.
    pub fn against(exposure: Decimal) -> Self {
        if exposure > Decimal::ZERO {
            Direction::Sell
        } else {
            Direction::Buy
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> Decimal {
        match self {
            Direction::Buy => Decimal::ONE,
            Direction::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Direction::Buy),
            "sell" | "short" => Ok(Direction::Sell),
            other => anyhow::bail!("direction must be 'buy' or 'sell', got '{}'", other),
        }
    }
}

/// Side indicator shown next to a position row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

/// Position as read off a venue: a magnitude string that may carry a leading `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPosition {
    pub symbol: String,
    pub magnitude: String,
}

impl RawPosition {
    pub fn new(symbol: impl Into<String>, magnitude: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            magnitude: magnitude.into(),
        }
    }

    /// Build from an unsigned size plus an explicit long/short indicator.
    pub fn from_sided(symbol: impl Into<String>, size: &str, side: PositionSide) -> Self {
        let unsigned = size.trim().trim_start_matches(|c: char| c == '-' || c == '+');
        let magnitude = match side {
            PositionSide::Long => unsigned.to_string(),
            PositionSide::Short => format!("-{}", unsigned),
        };
        Self::new(symbol, magnitude)
    }
}

/// Signed position in one symbol on one venue. Positive = long, negative = short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub signed_quantity: Decimal,
}

impl Position {
    /// Parse a raw reading; an unparsable magnitude counts as flat.
    pub fn from_raw(raw: &RawPosition) -> Self {
        Self {
            symbol: raw.symbol.clone(),
            signed_quantity: parse_or_zero(&raw.magnitude),
        }
    }

    /// No position held.
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            signed_quantity: Decimal::ZERO,
        }
    }
}

/// Signed sum of both venues' positions in the same symbol.
pub fn net_exposure(a: &Position, b: &Position) -> Decimal {
    a.signed_quantity + b.signed_quantity
}

/// Paired direction for the manual order path: one venue buys while the other sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairDirection {
    /// Buy on Lighter, sell on Variational.
    LongLighter,
    /// Sell on Lighter, buy on Variational.
    ShortLighter,
}

impl PairDirection {
    /// Direction to select on the given venue.
    pub fn direction_for(&self, venue: Venue) -> Direction {
        let lighter = match self {
            PairDirection::LongLighter => Direction::Buy,
            PairDirection::ShortLighter => Direction::Sell,
        };
        match venue {
            Venue::Lighter => lighter,
            Venue::Variational => lighter.opposite(),
        }
    }
}

impl FromStr for PairDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long-lighter" | "lbuy-vsell" => Ok(PairDirection::LongLighter),
            "short-lighter" | "lsell-vbuy" => Ok(PairDirection::ShortLighter),
            other => anyhow::bail!("unknown pair direction '{}'", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_parsing() {
        let long = Position::from_raw(&RawPosition::from_sided("BTC", "0.5", PositionSide::Long));
        let short = Position::from_raw(&RawPosition::from_sided("BTC", "0.3", PositionSide::Short));
        assert_eq!(long.signed_quantity, dec!(0.5));
        assert_eq!(short.signed_quantity, dec!(-0.3));

        // Variational reports the sign inline
        let inline = Position::from_raw(&RawPosition::new("BTC", "-1,250.5"));
        assert_eq!(inline.signed_quantity, dec!(-1250.5));

        let garbage = Position::from_raw(&RawPosition::new("BTC", "—"));
        assert_eq!(garbage.signed_quantity, Decimal::ZERO);
    }

    #[test]
    fn test_net_exposure_is_exact_sum() {
        let a = Position::from_raw(&RawPosition::new("BTC", "0.5"));
        let b = Position::from_raw(&RawPosition::new("BTC", "-0.3"));
        assert_eq!(net_exposure(&a, &b), dec!(0.2));

        let a = Position::from_raw(&RawPosition::new("ETH", "0.1"));
        let b = Position::from_raw(&RawPosition::new("ETH", "0.2"));
        assert_eq!(net_exposure(&a, &b), dec!(0.3));
    }

    #[test]
    fn test_direction_against_exposure() {
        assert_eq!(Direction::against(dec!(0.2)), Direction::Sell);
        assert_eq!(Direction::against(dec!(-0.2)), Direction::Buy);
        assert_eq!(Direction::Sell.sign(), dec!(-1));
    }

    #[test]
    fn test_pair_direction() {
        let pair: PairDirection = "lbuy-vsell".parse().unwrap();
        assert_eq!(pair.direction_for(Venue::Lighter), Direction::Buy);
        assert_eq!(pair.direction_for(Venue::Variational), Direction::Sell);
        assert_eq!(
            PairDirection::ShortLighter.direction_for(Venue::Variational),
            Direction::Buy
        );
    }

    #[test]
    fn test_venue_display() {
        assert_eq!(Venue::Lighter.to_string(), "Lighter");
        assert_eq!("variational".parse::<Venue>().unwrap(), Venue::Variational);
        assert!("binance".parse::<Venue>().is_err());
    }
}
