//! Paper venue for dry runs and tests.
//!
//! Simulates a venue order form in memory: the size input, the buy/sell
//! switch, the execution mode and the position table. Submitting fills the
//! order immediately unless auto-fill is turned off.

use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use super::traits::{VenueAdapter, ORDER_BOOK_DEPTH};
use super::types::{Direction, PositionSide, RawPosition, Venue};
use crate::utils::decimal::{format_fixed, parse_display_number};

/// A submission accepted by the paper venue.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperOrder {
    pub symbol: String,
    pub direction: Direction,
    pub quantity: Decimal,
    pub immediate: bool,
    pub at: Instant,
}

/// Simulated order-form and account state.
#[derive(Debug)]
struct PaperFormState {
    symbol: String,
    positions: HashMap<String, Decimal>,
    account_value: Decimal,
    quantity_input: String,
    direction: Direction,
    immediate: bool,
    book_level: Option<(Direction, usize)>,
    auto_fill: bool,
    clicks: Vec<Instant>,
    orders: Vec<PaperOrder>,
    quantity_writes: u32,
    /// Time the submit button takes to respond.
    submit_latency: Duration,
    failing: HashSet<&'static str>,
}

impl PaperFormState {
    fn new(symbol: &str, account_value: Decimal) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            positions: HashMap::new(),
            account_value,
            quantity_input: String::new(),
            direction: Direction::Buy,
            immediate: false,
            book_level: None,
            auto_fill: true,
            clicks: Vec::new(),
            orders: Vec::new(),
            quantity_writes: 0,
            submit_latency: Duration::ZERO,
            failing: HashSet::new(),
        }
    }

    fn check(&self, action: &'static str) -> Result<()> {
        if self.failing.contains(action) {
            bail!("{} target not found", action);
        }
        Ok(())
    }
}

/// In-memory venue implementing [`VenueAdapter`].
pub struct PaperVenue {
    venue: Venue,
    state: RwLock<PaperFormState>,
}

impl PaperVenue {
    /// Create a paper venue showing `symbol` with the given account value.
    pub fn new(venue: Venue, symbol: &str, account_value: Decimal) -> Self {
        Self {
            venue,
            state: RwLock::new(PaperFormState::new(symbol, account_value)),
        }
    }

    /// Seed a signed position.
    pub async fn set_position(&self, symbol: &str, signed_quantity: Decimal) {
        let mut state = self.state.write().await;
        state.positions.insert(symbol.to_uppercase(), signed_quantity);
    }

    /// When off, submissions are recorded but never change the position.
    pub async fn set_auto_fill(&self, auto_fill: bool) {
        self.state.write().await.auto_fill = auto_fill;
    }

    /// Delay every submit by `latency` before the click registers.
    pub async fn set_submit_latency(&self, latency: Duration) {
        self.state.write().await.submit_latency = latency;
    }

    /// Make every call to `action` fail (e.g. `"submit"`).
    pub async fn fail_action(&self, action: &'static str) {
        self.state.write().await.failing.insert(action);
    }

    pub async fn position(&self, symbol: &str) -> Decimal {
        let state = self.state.read().await;
        state
            .positions
            .get(&symbol.to_uppercase())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn orders(&self) -> Vec<PaperOrder> {
        self.state.read().await.orders.clone()
    }

    /// Times the submit button was pressed, accepted or not.
    pub async fn click_times(&self) -> Vec<Instant> {
        self.state.read().await.clicks.clone()
    }

    pub async fn quantity_input(&self) -> String {
        self.state.read().await.quantity_input.clone()
    }

    /// How many times the size input was written.
    pub async fn quantity_writes(&self) -> u32 {
        self.state.read().await.quantity_writes
    }

    pub async fn direction(&self) -> Direction {
        self.state.read().await.direction
    }

    pub async fn is_immediate(&self) -> bool {
        self.state.read().await.immediate
    }

    pub async fn book_level(&self) -> Option<(Direction, usize)> {
        self.state.read().await.book_level
    }

    pub async fn symbol(&self) -> String {
        self.state.read().await.symbol.clone()
    }
}

#[async_trait]
impl VenueAdapter for PaperVenue {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<RawPosition>> {
        let state = self.state.read().await;
        state.check("get_position")?;

        let symbol = symbol.to_uppercase();
        Ok(state
            .positions
            .get(&symbol)
            .filter(|qty| !qty.is_zero())
            .map(|qty| {
                let side = if qty.is_sign_negative() {
                    PositionSide::Short
                } else {
                    PositionSide::Long
                };
                RawPosition::from_sided(symbol.clone(), &qty.abs().to_string(), side)
            }))
    }

    async fn get_account_value(&self) -> Result<Option<String>> {
        let state = self.state.read().await;
        state.check("get_account_value")?;
        Ok(Some(format!("${}", format_fixed(state.account_value, 2))))
    }

    async fn set_quantity(&self, value: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.check("set_quantity")?;
        state.quantity_input = value.to_string();
        state.quantity_writes += 1;
        debug!(venue = %self.venue, quantity = %value, "Paper size input set");
        Ok(())
    }

    async fn select_direction(&self, direction: Direction) -> Result<()> {
        let mut state = self.state.write().await;
        state.check("select_direction")?;
        state.direction = direction;
        Ok(())
    }

    async fn select_immediate_execution_mode(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.check("select_immediate_execution_mode")?;
        state.immediate = true;
        Ok(())
    }

    async fn submit(&self) -> Result<()> {
        let latency = {
            let state = self.state.read().await;
            state.check("submit")?;
            state.submit_latency
        };
        if !latency.is_zero() {
            time::sleep(latency).await;
        }

        let mut state = self.state.write().await;

        let now = Instant::now();
        state.clicks.push(now);

        // A blank or zero size leaves the form untouched, like the real button.
        let quantity = match parse_display_number(&state.quantity_input) {
            Some(qty) if qty > Decimal::ZERO => qty,
            _ => {
                debug!(venue = %self.venue, "Paper submit ignored: no size entered");
                return Ok(());
            }
        };

        let symbol = state.symbol.clone();
        let direction = state.direction;
        let immediate = state.immediate;
        state.orders.push(PaperOrder {
            symbol: symbol.clone(),
            direction,
            quantity,
            immediate,
            at: now,
        });

        if state.auto_fill {
            let position = state.positions.entry(symbol.clone()).or_insert(Decimal::ZERO);
            *position += direction.sign() * quantity;
            info!(
                venue = %self.venue,
                %symbol,
                %direction,
                %quantity,
                position = %*position,
                "Paper order filled"
            );
        }

        Ok(())
    }

    async fn select_order_book_level(&self, direction: Direction, index: usize) -> Result<()> {
        let mut state = self.state.write().await;
        state.check("select_order_book_level")?;
        if index >= ORDER_BOOK_DEPTH {
            bail!(
                "order book level {} out of range (0..{})",
                index,
                ORDER_BOOK_DEPTH
            );
        }
        state.book_level = Some((direction, index));
        Ok(())
    }

    async fn navigate_to_symbol(&self, symbol: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.check("navigate_to_symbol")?;
        state.symbol = symbol.to_uppercase();
        state.quantity_input.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_submit_fills_position() {
        let venue = PaperVenue::new(Venue::Lighter, "btc", dec!(1000));
        venue.set_quantity("0.25").await.unwrap();
        venue.select_direction(Direction::Sell).await.unwrap();
        venue.select_immediate_execution_mode().await.unwrap();
        venue.submit().await.unwrap();

        assert_eq!(venue.position("BTC").await, dec!(-0.25));
        let raw = venue.get_position("BTC").await.unwrap().unwrap();
        assert_eq!(raw.magnitude, "-0.25");

        let orders = venue.orders().await;
        assert_eq!(orders.len(), 1);
        assert!(orders[0].immediate);
    }

    #[tokio::test]
    async fn test_auto_fill_off_keeps_position() {
        let venue = PaperVenue::new(Venue::Variational, "ETH", dec!(1000));
        venue.set_position("ETH", dec!(1.5)).await;
        venue.set_auto_fill(false).await;
        venue.set_quantity("1").await.unwrap();
        venue.submit().await.unwrap();

        assert_eq!(venue.position("ETH").await, dec!(1.5));
        assert_eq!(venue.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_size_is_a_click_without_order() {
        let venue = PaperVenue::new(Venue::Lighter, "BTC", dec!(1000));
        venue.submit().await.unwrap();

        assert_eq!(venue.click_times().await.len(), 1);
        assert!(venue.orders().await.is_empty());
        assert!(venue.get_position("BTC").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_action() {
        let venue = PaperVenue::new(Venue::Lighter, "BTC", dec!(1000));
        venue.fail_action("submit").await;
        let err = venue.submit().await.unwrap_err();
        assert!(err.to_string().contains("submit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_latency_delays_the_click() {
        let venue = PaperVenue::new(Venue::Lighter, "BTC", dec!(1000));
        venue.set_submit_latency(Duration::from_millis(250)).await;
        venue.set_quantity("1").await.unwrap();

        let pressed = Instant::now();
        venue.submit().await.unwrap();

        let orders = venue.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].at - pressed, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_order_book_level_range() {
        let venue = PaperVenue::new(Venue::Lighter, "BTC", dec!(1000));
        venue.select_order_book_level(Direction::Buy, 9).await.unwrap();
        assert_eq!(venue.book_level().await, Some((Direction::Buy, 9)));
        assert!(venue
            .select_order_book_level(Direction::Buy, ORDER_BOOK_DEPTH)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_account_value_display() {
        let venue = PaperVenue::new(Venue::Lighter, "BTC", dec!(12345.6));
        assert_eq!(
            venue.get_account_value().await.unwrap(),
            Some("$12345.60".to_string())
        );
    }
}
