//! Venue-agnostic traits for order-form automation.
//!
//! Provides a common interface over whatever drives a venue's order form
//! (an in-memory paper venue, a browser automation bridge, ...) for:
//! - Position and account readings
//! - Filling in quantity, direction and execution mode
//! - Submitting the form
//!
//! Every call may fail (adapter unreachable, form element missing); callers
//! decide whether that is fatal.

use async_trait::async_trait;
use std::sync::Arc;

use super::types::{Direction, RawPosition, Venue};

/// Number of price levels shown per side of the order book.
pub const ORDER_BOOK_DEPTH: usize = 10;

/// Per-venue order-form primitives.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Returns the venue this session belongs to.
    fn venue(&self) -> Venue;

    /// Read the position row for `symbol`, if one is shown.
    async fn get_position(&self, symbol: &str) -> anyhow::Result<Option<RawPosition>>;

    /// Read the account value as displayed (currency string), if shown.
    async fn get_account_value(&self) -> anyhow::Result<Option<String>>;

    /// Type a quantity into the size input.
    async fn set_quantity(&self, value: &str) -> anyhow::Result<()>;

    /// Pick buy or sell on the order form.
    async fn select_direction(&self, direction: Direction) -> anyhow::Result<()>;

    /// Switch the form to immediate (market) execution.
    async fn select_immediate_execution_mode(&self) -> anyhow::Result<()>;

    /// Press the submit button.
    async fn submit(&self) -> anyhow::Result<()>;

    /// Click a price level in the order book (`index < ORDER_BOOK_DEPTH`).
    ///
    /// Only used by the manual order path.
    async fn select_order_book_level(&self, direction: Direction, index: usize)
        -> anyhow::Result<()>;

    /// Open the trading page for `symbol`.
    async fn navigate_to_symbol(&self, symbol: &str) -> anyhow::Result<()>;
}

/// Resolves which open session belongs to which venue.
#[async_trait]
pub trait SessionLocator: Send + Sync {
    /// Find the open session for `venue`, if any.
    async fn locate(&self, venue: Venue) -> anyhow::Result<Option<Arc<dyn VenueAdapter>>>;

    /// All currently open sessions, in `Venue::ALL` order.
    async fn open_sessions(&self) -> anyhow::Result<Vec<Arc<dyn VenueAdapter>>> {
        let mut sessions = Vec::with_capacity(Venue::ALL.len());
        for venue in Venue::ALL {
            if let Some(session) = self.locate(venue).await? {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }
}
