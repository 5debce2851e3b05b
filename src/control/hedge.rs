//! Hedge controller: keeps the combined position of both venues delta-neutral.
//!
//! Every poll the controller reads the symbol's position on both venues and sums
//! them. When the absolute net exposure reaches the imbalance threshold it types
//! the exposure into the corrective venue's order form, switches it to
//! immediate execution, picks the reducing direction and submits.
//!
//! Corrective orders are single-flight. Submitting takes a lock that is *not*
//! released when the submission succeeds: the controller cannot observe fills,
//! so it waits until `lock_timeout` has elapsed (or the run is stopped) before
//! it will act again. A tick that finds the lock expired only releases it.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::run::RunSlot;
use super::status::{HedgeStatus, StatusHub};
use crate::error::ControlError;
use crate::utils::decimal::format_fixed;
use crate::venue::{
    net_exposure, Direction, Position, SessionLocator, Venue, VenueAdapter,
};

/// Parameters supplied with each `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct HedgeParams {
    pub symbol: String,
    pub poll_interval: Duration,
    pub imbalance_threshold: Decimal,
    pub lock_timeout: Duration,
}

impl HedgeParams {
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.symbol.trim().is_empty() {
            return Err(ControlError::InvalidParameters("symbol is empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ControlError::InvalidParameters(
                "poll interval must be positive".into(),
            ));
        }
        if self.imbalance_threshold <= Decimal::ZERO {
            return Err(ControlError::InvalidParameters(
                "imbalance threshold must be positive".into(),
            ));
        }
        if self.lock_timeout.is_zero() {
            return Err(ControlError::InvalidParameters(
                "lock timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Settings fixed for the lifetime of a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct HedgeSettings {
    /// Venue that receives corrective orders.
    pub corrective_venue: Venue,
    /// Pause after typing a new quantity so the form picks it up before submit.
    pub settle_delay: Duration,
    /// Fractional digits of the corrective quantity.
    pub quantity_precision: u32,
}

impl HedgeSettings {
    /// Smallest threshold whose breach still rounds to a nonzero quantity,
    /// i.e. half a unit of the last displayed digit.
    pub fn smallest_threshold(&self) -> Decimal {
        Decimal::new(5, self.quantity_precision.min(27) + 1)
    }
}

impl Default for HedgeSettings {
    fn default() -> Self {
        Self {
            corrective_venue: Venue::Lighter,
            settle_delay: Duration::from_millis(300),
            quantity_precision: 5,
        }
    }
}

/// Per-run state. Dropped when the run ends, which also drops the lock.
#[derive(Debug, Default)]
struct HedgeSession {
    /// `Some` while locked.
    lock_acquired_at: Option<Instant>,
    last_quantity_set: Option<String>,
}

pub(crate) struct HedgeTask {
    params: HedgeParams,
    settings: HedgeSettings,
    locator: Arc<dyn SessionLocator>,
    hub: StatusHub,
    session: HedgeSession,
}

impl HedgeTask {
    pub(crate) fn new(
        params: HedgeParams,
        settings: HedgeSettings,
        locator: Arc<dyn SessionLocator>,
        hub: StatusHub,
    ) -> Self {
        Self {
            params,
            settings,
            locator,
            hub,
            session: HedgeSession::default(),
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        info!(
            symbol = %self.params.symbol,
            poll_ms = self.params.poll_interval.as_millis() as u64,
            threshold = %self.params.imbalance_threshold,
            lock_timeout_ms = self.params.lock_timeout.as_millis() as u64,
            corrective_venue = %self.settings.corrective_venue,
            "Hedge controller started"
        );
        self.hub.publish_hedge(HedgeStatus::Started {
            symbol: self.params.symbol.clone(),
        });

        let mut ticker = time::interval(self.params.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(symbol = %self.params.symbol, "Hedge controller stopped");
                    self.hub.publish_hedge(HedgeStatus::Stopped);
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(status) => self.hub.publish_hedge(status),
                Err(e) => {
                    error!(symbol = %self.params.symbol, "Hedge controller halted: {}", e);
                    self.hub.publish_hedge(HedgeStatus::Error {
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    /// One evaluation. Returns the status to publish for this tick.
    pub(crate) async fn tick(&mut self) -> Result<HedgeStatus, ControlError> {
        let now = Instant::now();

        if let Some(acquired_at) = self.session.lock_acquired_at {
            let elapsed = now.duration_since(acquired_at);
            let elapsed_ms = elapsed.as_millis() as u64;

            if elapsed > self.params.lock_timeout {
                // Fill status is unknown; treat the corrective order as lost.
                self.session.lock_acquired_at = None;
                warn!(elapsed_ms, "Corrective order lock timed out, releasing");
                return Ok(HedgeStatus::LockTimedOut { elapsed_ms });
            }

            debug!(elapsed_ms, "Corrective order in flight, skipping tick");
            return Ok(HedgeStatus::Waiting {
                elapsed_ms,
                timeout_ms: self.params.lock_timeout.as_millis() as u64,
            });
        }

        let lighter = self.require_session(Venue::Lighter).await?;
        let variational = self.require_session(Venue::Variational).await?;

        let symbol = self.params.symbol.as_str();
        let (lighter_position, variational_position) = tokio::join!(
            read_position(lighter.as_ref(), symbol),
            read_position(variational.as_ref(), symbol),
        );
        let (lighter_position, variational_position) = (lighter_position?, variational_position?);

        let net = net_exposure(&lighter_position, &variational_position);
        debug!(
            %symbol,
            lighter = %lighter_position.signed_quantity,
            variational = %variational_position.signed_quantity,
            %net,
            "Exposure sampled"
        );

        if net.abs() < self.params.imbalance_threshold {
            return Ok(HedgeStatus::Monitoring {
                lighter: lighter_position.signed_quantity,
                variational: variational_position.signed_quantity,
                net,
            });
        }

        self.session.lock_acquired_at = Some(now);

        let direction = Direction::against(net);
        let quantity = format_fixed(net.abs(), self.settings.quantity_precision);
        let venue = self.settings.corrective_venue;
        let corrective = match venue {
            Venue::Lighter => lighter,
            Venue::Variational => variational,
        };

        info!(
            %symbol,
            %net,
            %direction,
            %quantity,
            %venue,
            "Imbalance over threshold, placing corrective order"
        );

        if self.session.last_quantity_set.as_deref() != Some(quantity.as_str()) {
            corrective
                .set_quantity(&quantity)
                .await
                .map_err(|e| ControlError::adapter(venue, "set_quantity", e))?;
            self.session.last_quantity_set = Some(quantity.clone());
            self.hub.record_corrective_quantity(&quantity);

            if !self.settings.settle_delay.is_zero() {
                time::sleep(self.settings.settle_delay).await;
            }
        }

        corrective
            .select_immediate_execution_mode()
            .await
            .map_err(|e| ControlError::adapter(venue, "select_immediate_execution_mode", e))?;
        corrective
            .select_direction(direction)
            .await
            .map_err(|e| ControlError::adapter(venue, "select_direction", e))?;
        corrective
            .submit()
            .await
            .map_err(|e| ControlError::adapter(venue, "submit", e))?;

        Ok(HedgeStatus::Hedging {
            venue,
            direction,
            quantity,
            net,
        })
    }

    async fn require_session(&self, venue: Venue) -> Result<Arc<dyn VenueAdapter>, ControlError> {
        self.locator
            .locate(venue)
            .await
            .map_err(|e| ControlError::adapter(venue, "locate", e))?
            .ok_or(ControlError::SessionNotFound(venue))
    }

    #[cfg(test)]
    fn is_locked(&self) -> bool {
        self.session.lock_acquired_at.is_some()
    }
}

async fn read_position(adapter: &dyn VenueAdapter, symbol: &str) -> Result<Position, ControlError> {
    let raw = adapter
        .get_position(symbol)
        .await
        .map_err(|e| ControlError::adapter(adapter.venue(), "get_position", e))?;

    Ok(raw
        .map(|raw| Position::from_raw(&raw))
        .unwrap_or_else(|| Position::flat(symbol)))
}

/// Handle owning at most one hedge run.
pub struct HedgeController {
    locator: Arc<dyn SessionLocator>,
    hub: StatusHub,
    settings: HedgeSettings,
    run: RunSlot,
}

impl HedgeController {
    pub fn new(locator: Arc<dyn SessionLocator>, hub: StatusHub, settings: HedgeSettings) -> Self {
        Self {
            locator,
            hub,
            settings,
            run: RunSlot::default(),
        }
    }

    /// Begin periodic evaluation.
    ///
    /// Returns `Ok(false)` without side effects if a run is already active.
    pub async fn start(&self, params: HedgeParams) -> Result<bool, ControlError> {
        params.validate()?;
        let smallest = self.settings.smallest_threshold();
        if params.imbalance_threshold < smallest {
            return Err(ControlError::InvalidParameters(format!(
                "imbalance threshold {} rounds to a zero quantity at {} decimals (minimum {})",
                params.imbalance_threshold, self.settings.quantity_precision, smallest
            )));
        }

        let task = HedgeTask::new(
            params,
            self.settings.clone(),
            Arc::clone(&self.locator),
            self.hub.clone(),
        );
        let launched = self.run.launch(move |cancel| task.run(cancel)).await;
        if !launched {
            warn!("Hedge controller already running, start ignored");
        }
        Ok(launched)
    }

    /// Stop the active run, if any. Safe to call when idle (no status is emitted).
    pub async fn stop(&self) -> bool {
        self.run.stop().await
    }

    pub async fn is_running(&self) -> bool {
        self.run.is_running().await
    }
}
