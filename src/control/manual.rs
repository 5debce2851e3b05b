//! Manual order path: one-shot actions on whichever venue sessions are open.
//!
//! Used from the command line to prepare both order forms by hand (same size,
//! opposite directions), submit them together or one at a time, click an
//! order-book level, or move both venues to another symbol.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::run::settle_all;
use crate::error::ControlError;
use crate::utils::decimal::{format_fixed, parse_display_number};
use crate::venue::{
    Direction, PairDirection, Position, SessionLocator, Venue, VenueAdapter, ORDER_BOOK_DEPTH,
};

/// Position and account reading for one venue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueSnapshot {
    pub venue: Venue,
    pub open: bool,
    pub position: Decimal,
    pub account_value: Option<Decimal>,
}

impl fmt::Display for VenueSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.account_value.unwrap_or(Decimal::ZERO);
        write!(
            f,
            "{:<12} size {:>12}  value {:>12}{}",
            self.venue.to_string(),
            format_fixed(self.position, 4),
            format_fixed(value, 1),
            if self.open { "" } else { "  (no session)" }
        )
    }
}

/// Manual one-shot actions across both venues.
pub struct ManualDesk {
    locator: Arc<dyn SessionLocator>,
}

impl ManualDesk {
    pub fn new(locator: Arc<dyn SessionLocator>) -> Self {
        Self { locator }
    }

    /// Type `quantity` into every open venue's size input. Returns the venues touched.
    pub async fn set_quantity(&self, quantity: &str) -> Result<Vec<Venue>, ControlError> {
        match parse_display_number(quantity) {
            Some(qty) if qty > Decimal::ZERO => {}
            _ => {
                return Err(ControlError::InvalidParameters(format!(
                    "quantity '{}' is not a positive number",
                    quantity
                )))
            }
        }

        let sessions = self.open_sessions().await?;
        settle_all(sessions.iter().map(|session| async move {
            session
                .set_quantity(quantity)
                .await
                .map_err(|e| ControlError::adapter(session.venue(), "set_quantity", e))
        }))
        .await?;

        info!(%quantity, venues = sessions.len(), "Quantity set");
        Ok(venues_of(&sessions))
    }

    /// Select opposite directions on the two venues.
    pub async fn select_pair(&self, pair: PairDirection) -> Result<Vec<Venue>, ControlError> {
        let sessions = self.open_sessions().await?;
        settle_all(sessions.iter().map(|session| async move {
            let venue = session.venue();
            session
                .select_direction(pair.direction_for(venue))
                .await
                .map_err(|e| ControlError::adapter(venue, "select_direction", e))
        }))
        .await?;

        info!(?pair, "Pair direction selected");
        Ok(venues_of(&sessions))
    }

    /// Submit on every open venue at once.
    pub async fn submit_all(&self) -> Result<Vec<Venue>, ControlError> {
        let sessions = self.open_sessions().await?;
        settle_all(sessions.iter().map(|session| async move {
            session
                .submit()
                .await
                .map_err(|e| ControlError::adapter(session.venue(), "submit", e))
        }))
        .await?;

        info!(venues = sessions.len(), "Submitted on all open venues");
        Ok(venues_of(&sessions))
    }

    /// Submit on one venue; its session must be open.
    pub async fn submit(&self, venue: Venue) -> Result<(), ControlError> {
        let session = self.require_session(venue).await?;
        session
            .submit()
            .await
            .map_err(|e| ControlError::adapter(venue, "submit", e))?;
        info!(%venue, "Submitted");
        Ok(())
    }

    /// Click the `index`-th price level on the `direction` side of `venue`'s book.
    pub async fn select_order_book_level(
        &self,
        venue: Venue,
        direction: Direction,
        index: usize,
    ) -> Result<(), ControlError> {
        if index >= ORDER_BOOK_DEPTH {
            return Err(ControlError::InvalidParameters(format!(
                "order book level {} out of range (0..{})",
                index, ORDER_BOOK_DEPTH
            )));
        }

        let session = self.require_session(venue).await?;
        session
            .select_order_book_level(direction, index)
            .await
            .map_err(|e| ControlError::adapter(venue, "select_order_book_level", e))
    }

    /// Open `symbol`'s trading page on every open venue.
    pub async fn switch_symbol(&self, symbol: &str) -> Result<Vec<Venue>, ControlError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ControlError::InvalidParameters("symbol is empty".into()));
        }

        let sessions = self.open_sessions().await?;
        let symbol = symbol.as_str();
        settle_all(sessions.iter().map(|session| async move {
            session
                .navigate_to_symbol(symbol)
                .await
                .map_err(|e| ControlError::adapter(session.venue(), "navigate_to_symbol", e))
        }))
        .await?;

        info!(%symbol, "Switched symbol");
        Ok(venues_of(&sessions))
    }

    /// Position and account value per venue. Missing sessions read as zero.
    pub async fn snapshot(&self, symbol: &str) -> Result<Vec<VenueSnapshot>, ControlError> {
        let mut snapshots = Vec::with_capacity(Venue::ALL.len());
        for venue in Venue::ALL {
            let session = self
                .locator
                .locate(venue)
                .await
                .map_err(|e| ControlError::adapter(venue, "locate", e))?;

            let snapshot = match session {
                None => VenueSnapshot {
                    venue,
                    open: false,
                    position: Decimal::ZERO,
                    account_value: None,
                },
                Some(session) => {
                    let (raw, value) = tokio::join!(
                        async {
                            session
                                .get_position(symbol)
                                .await
                                .map_err(|e| ControlError::adapter(venue, "get_position", e))
                        },
                        async {
                            session
                                .get_account_value()
                                .await
                                .map_err(|e| ControlError::adapter(venue, "get_account_value", e))
                        },
                    );
                    let (raw, value) = (raw?, value?);

                    VenueSnapshot {
                        venue,
                        open: true,
                        position: raw
                            .map(|raw| Position::from_raw(&raw).signed_quantity)
                            .unwrap_or(Decimal::ZERO),
                        account_value: value.as_deref().and_then(parse_display_number),
                    }
                }
            };
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }

    async fn open_sessions(&self) -> Result<Vec<Arc<dyn VenueAdapter>>, ControlError> {
        let mut sessions = Vec::with_capacity(Venue::ALL.len());
        for venue in Venue::ALL {
            if let Some(session) = self
                .locator
                .locate(venue)
                .await
                .map_err(|e| ControlError::adapter(venue, "locate", e))?
            {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    async fn require_session(&self, venue: Venue) -> Result<Arc<dyn VenueAdapter>, ControlError> {
        self.locator
            .locate(venue)
            .await
            .map_err(|e| ControlError::adapter(venue, "locate", e))?
            .ok_or(ControlError::SessionNotFound(venue))
    }
}

fn venues_of(sessions: &[Arc<dyn VenueAdapter>]) -> Vec<Venue> {
    sessions.iter().map(|session| session.venue()).collect()
}
