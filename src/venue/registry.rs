//! In-memory session locator.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::{SessionLocator, VenueAdapter};
use super::types::Venue;

/// Holds at most one open session per venue; sessions are opened and closed explicitly.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Venue, Arc<dyn VenueAdapter>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its own venue, replacing any previous one.
    pub async fn open(&self, session: Arc<dyn VenueAdapter>) {
        let venue = session.venue();
        self.sessions.write().await.insert(venue, session);
        debug!(%venue, "Session opened");
    }

    /// Drop the session for `venue`. Returns whether one was open.
    pub async fn close(&self, venue: Venue) -> bool {
        let closed = self.sessions.write().await.remove(&venue).is_some();
        if closed {
            debug!(%venue, "Session closed");
        }
        closed
    }
}

#[async_trait]
impl SessionLocator for SessionRegistry {
    async fn locate(&self, venue: Venue) -> anyhow::Result<Option<Arc<dyn VenueAdapter>>> {
        Ok(self.sessions.read().await.get(&venue).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::PaperVenue;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_open_and_close_sessions() {
        let registry = SessionRegistry::new();
        registry
            .open(Arc::new(PaperVenue::new(Venue::Variational, "BTC", dec!(100))))
            .await;

        assert!(registry.locate(Venue::Lighter).await.unwrap().is_none());
        let found = registry.locate(Venue::Variational).await.unwrap().unwrap();
        assert_eq!(found.venue(), Venue::Variational);
        assert_eq!(registry.open_sessions().await.unwrap().len(), 1);

        assert!(registry.close(Venue::Variational).await);
        assert!(!registry.close(Venue::Variational).await);
        assert!(registry.open_sessions().await.unwrap().is_empty());
    }

    #[test]
    fn test_open_replaces_previous_session() {
        tokio_test::block_on(async {
            let registry = SessionRegistry::new();
            registry
                .open(Arc::new(PaperVenue::new(Venue::Lighter, "BTC", dec!(100))))
                .await;
            registry
                .open(Arc::new(PaperVenue::new(Venue::Lighter, "BTC", dec!(200))))
                .await;

            let found = registry.locate(Venue::Lighter).await.unwrap().unwrap();
            assert_eq!(
                found.get_account_value().await.unwrap().as_deref(),
                Some("$200.00")
            );
            assert_eq!(registry.open_sessions().await.unwrap().len(), 1);
        });
    }
}
