//! Submit scheduler: presses submit a fixed number of times at jittered intervals.
//!
//! Each cycle clicks submit on every open venue session at once, then sleeps a
//! delay drawn uniformly from `[min_interval, max_interval]` before the next
//! cycle. Delays are chained, so cycles never overlap. Clicks already issued
//! are never undone, whatever ends the run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::run::{settle_all, RunSlot};
use super::status::{StatusHub, SubmitStatus};
use crate::error::ControlError;
use crate::venue::{SessionLocator, Venue};

/// Parameters supplied with each `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitParams {
    pub total_clicks: u32,
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl SubmitParams {
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.total_clicks == 0 {
            return Err(ControlError::InvalidParameters(
                "total clicks must be at least 1".into(),
            ));
        }
        if self.min_interval > self.max_interval {
            return Err(ControlError::InvalidParameters(format!(
                "min interval {}ms exceeds max interval {}ms",
                self.min_interval.as_millis(),
                self.max_interval.as_millis()
            )));
        }
        Ok(())
    }
}

/// Draws inter-cycle delays uniformly from a closed range.
#[derive(Debug)]
pub struct IntervalSampler {
    rng: StdRng,
}

impl IntervalSampler {
    /// Seeded sampler for reproducible runs, entropy-seeded otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// A delay in `[min, max]` at nanosecond resolution. Returns `min` when `min >= max`.
    pub fn sample(&mut self, min: Duration, max: Duration) -> Duration {
        if min >= max {
            return min;
        }
        let min_ns = u64::try_from(min.as_nanos()).unwrap_or(u64::MAX);
        let max_ns = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
        if min_ns >= max_ns {
            return min;
        }
        Duration::from_nanos(self.rng.gen_range(min_ns..=max_ns))
    }
}

/// Per-run counters.
#[derive(Debug)]
struct SubmitSession {
    total_clicks: u32,
    clicks_remaining: u32,
}

impl SubmitSession {
    fn completed(&self) -> u32 {
        self.total_clicks - self.clicks_remaining
    }
}

pub(crate) struct SubmitTask {
    params: SubmitParams,
    session: SubmitSession,
    locator: Arc<dyn SessionLocator>,
    hub: StatusHub,
    sampler: IntervalSampler,
}

impl SubmitTask {
    pub(crate) fn new(
        params: SubmitParams,
        locator: Arc<dyn SessionLocator>,
        hub: StatusHub,
        sampler: IntervalSampler,
    ) -> Self {
        Self {
            session: SubmitSession {
                total_clicks: params.total_clicks,
                clicks_remaining: params.total_clicks,
            },
            params,
            locator,
            hub,
            sampler,
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        let total = self.session.total_clicks;
        info!(
            total,
            min_ms = self.params.min_interval.as_millis() as u64,
            max_ms = self.params.max_interval.as_millis() as u64,
            "Submit scheduler started"
        );
        self.hub.publish_submit(SubmitStatus::Started { total });

        loop {
            if cancel.is_cancelled() {
                self.finish_stopped();
                return;
            }
            if self.session.clicks_remaining == 0 {
                self.finish_completed();
                return;
            }

            let current = self.session.completed() + 1;
            self.hub
                .publish_submit(SubmitStatus::Clicking { current, total });

            if let Err(e) = self.cycle().await {
                error!(
                    completed = self.session.completed(),
                    total, "Submit scheduler halted: {}", e
                );
                self.hub.publish_submit(SubmitStatus::Error {
                    message: e.to_string(),
                });
                return;
            }
            self.session.clicks_remaining -= 1;

            if self.session.clicks_remaining == 0 {
                self.finish_completed();
                return;
            }

            let delay = self
                .sampler
                .sample(self.params.min_interval, self.params.max_interval);
            debug!(delay_ms = delay.as_millis() as u64, "Next click scheduled");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.finish_stopped();
                    return;
                }
                _ = time::sleep(delay) => {}
            }
        }
    }

    /// Click submit on every open session concurrently. Returns how many were clicked.
    pub(crate) async fn cycle(&self) -> Result<usize, ControlError> {
        let mut sessions = Vec::with_capacity(Venue::ALL.len());
        for venue in Venue::ALL {
            match self
                .locator
                .locate(venue)
                .await
                .map_err(|e| ControlError::adapter(venue, "locate", e))?
            {
                Some(session) => sessions.push(session),
                None => debug!(%venue, "No open session, skipping"),
            }
        }

        if sessions.is_empty() {
            warn!("No venue sessions open, click skipped");
        }

        let calls: Vec<_> = sessions
            .iter()
            .map(|session| async move {
                session
                    .submit()
                    .await
                    .map_err(|e| ControlError::adapter(session.venue(), "submit", e))
            })
            .collect();
        settle_all(calls).await?;

        Ok(sessions.len())
    }

    fn finish_completed(&self) {
        info!(total = self.session.total_clicks, "Submit run completed");
        self.hub.publish_submit(SubmitStatus::Completed {
            total: self.session.total_clicks,
        });
    }

    fn finish_stopped(&self) {
        info!(
            completed = self.session.completed(),
            total = self.session.total_clicks,
            "Submit run stopped"
        );
        self.hub.publish_submit(SubmitStatus::Stopped {
            completed: self.session.completed(),
            total: self.session.total_clicks,
        });
    }
}

/// Handle owning at most one submit run.
pub struct SubmitScheduler {
    locator: Arc<dyn SessionLocator>,
    hub: StatusHub,
    seed: Option<u64>,
    run: RunSlot,
}

impl SubmitScheduler {
    pub fn new(locator: Arc<dyn SessionLocator>, hub: StatusHub) -> Self {
        Self {
            locator,
            hub,
            seed: None,
            run: RunSlot::default(),
        }
    }

    /// Use a fixed RNG seed for interval jitter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Begin a bounded run. A `start` while running is a no-op returning `Ok(false)`.
    pub async fn start(&self, params: SubmitParams) -> Result<bool, ControlError> {
        params.validate()?;

        let task = SubmitTask::new(
            params,
            Arc::clone(&self.locator),
            self.hub.clone(),
            IntervalSampler::new(self.seed),
        );
        let launched = self.run.launch(move |cancel| task.run(cancel)).await;
        if !launched {
            warn!("Submit scheduler already running, start ignored");
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
