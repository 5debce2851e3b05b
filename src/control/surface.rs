//! Control surface: the single entry point a front end talks to.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::info;

use super::hedge::{HedgeController, HedgeParams, HedgeSettings};
use super::manual::ManualDesk;
use super::status::{DisplayState, StatusEvent, StatusHub};
use super::submit::{SubmitParams, SubmitScheduler};
use crate::error::ControlError;
use crate::venue::SessionLocator;

/// Start/stop commands for both controllers plus the shared status stream.
pub struct ControlSurface {
    hedge: HedgeController,
    submit: SubmitScheduler,
    manual: ManualDesk,
    hub: StatusHub,
}

impl ControlSurface {
    pub fn new(locator: Arc<dyn SessionLocator>, settings: HedgeSettings) -> Self {
        Self::with_hub(locator, settings, StatusHub::default(), None)
    }

    /// Build with an explicit hub and an optional jitter seed.
    pub fn with_hub(
        locator: Arc<dyn SessionLocator>,
        settings: HedgeSettings,
        hub: StatusHub,
        seed: Option<u64>,
    ) -> Self {
        let mut submit = SubmitScheduler::new(Arc::clone(&locator), hub.clone());
        if let Some(seed) = seed {
            submit = submit.with_seed(seed);
        }

        Self {
            hedge: HedgeController::new(Arc::clone(&locator), hub.clone(), settings),
            submit,
            manual: ManualDesk::new(locator),
            hub,
        }
    }

    pub async fn start_hedge(&self, params: HedgeParams) -> Result<bool, ControlError> {
        self.hedge.start(params).await
    }

    pub async fn stop_hedge(&self) -> bool {
        self.hedge.stop().await
    }

    pub async fn start_submit(&self, params: SubmitParams) -> Result<bool, ControlError> {
        self.submit.start(params).await
    }

    pub async fn stop_submit(&self) -> bool {
        self.submit.stop().await
    }

    pub async fn hedge_running(&self) -> bool {
        self.hedge.is_running().await
    }

    pub async fn submit_running(&self) -> bool {
        self.submit.is_running().await
    }

    pub fn manual(&self) -> &ManualDesk {
        &self.manual
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.hub.subscribe()
    }

    pub fn watch_display(&self) -> watch::Receiver<DisplayState> {
        self.hub.watch_display()
    }

    pub fn display_state(&self) -> DisplayState {
        self.hub.display_state()
    }

    /// Stop both controllers and wait for them to exit.
    pub async fn shutdown(&self) {
        let (hedge, submit) = tokio::join!(self.hedge.stop(), self.submit.stop());
        info!(hedge_stopped = hedge, submit_stopped = submit, "Control surface shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::status::{HedgeStatus, SubmitStatus};
    use crate::venue::{PaperVenue, SessionRegistry, Venue, VenueAdapter};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::time;

    async fn surface() -> (ControlSurface, Arc<PaperVenue>, Arc<PaperVenue>) {
        let lighter = Arc::new(PaperVenue::new(Venue::Lighter, "BTC", dec!(1000)));
        let variational = Arc::new(PaperVenue::new(Venue::Variational, "BTC", dec!(1000)));
        let registry = Arc::new(SessionRegistry::new());
        registry.open(lighter.clone()).await;
        registry.open(variational.clone()).await;
        let surface = ControlSurface::with_hub(
            registry,
            HedgeSettings::default(),
            StatusHub::default(),
            Some(7),
        );
        (surface, lighter, variational)
    }

    fn hedge_params() -> HedgeParams {
        HedgeParams {
            symbol: "BTC".to_string(),
            poll_interval: Duration::from_millis(500),
            imbalance_threshold: dec!(0.01),
            lock_timeout: Duration::from_millis(5000),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_controllers_run_independently() {
        let (surface, lighter, variational) = surface().await;
        lighter.set_quantity("1").await.unwrap();
        variational.set_quantity("1").await.unwrap();

        assert!(surface.start_hedge(hedge_params()).await.unwrap());
        assert!(surface
            .start_submit(SubmitParams {
                total_clicks: 2,
                min_interval: Duration::from_millis(100),
                max_interval: Duration::from_millis(200),
            })
            .await
            .unwrap());

        time::sleep(Duration::from_millis(1000)).await;

        assert!(surface.hedge_running().await);
        assert!(!surface.submit_running().await);
        assert_eq!(
            surface.display_state().submit.as_deref(),
            Some("Completed")
        );

        assert!(surface.stop_hedge().await);
        assert!(!surface.hedge_running().await);
        assert_eq!(surface.display_state().hedge.as_deref(), Some("Stopped"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_when_idle_is_silent() {
        let (surface, _, _) = surface().await;
        let mut rx = surface.subscribe();

        assert!(!surface.stop_hedge().await);
        assert!(!surface.stop_submit().await);
        assert!(rx.try_recv().is_err());
        assert_eq!(surface.display_state(), DisplayState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let (surface, _, _) = surface().await;
        let mut rx = surface.subscribe();

        surface.start_hedge(hedge_params()).await.unwrap();
        surface
            .start_submit(SubmitParams {
                total_clicks: 50,
                min_interval: Duration::from_millis(1000),
                max_interval: Duration::from_millis(1000),
            })
            .await
            .unwrap();
        time::sleep(Duration::from_millis(10)).await;

        surface.shutdown().await;
        assert!(!surface.hedge_running().await);
        assert!(!surface.submit_running().await);

        let mut saw_hedge_stop = false;
        let mut saw_submit_stop = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                StatusEvent::Hedge(HedgeStatus::Stopped) => saw_hedge_stop = true,
                StatusEvent::Submit(SubmitStatus::Stopped { .. }) => saw_submit_stop = true,
                _ => {}
            }
        }
        assert!(saw_hedge_stop && saw_submit_stop);
    }
}
