//! Status snapshots published by the controllers.
//!
//! Every tick, cycle and state transition produces exactly one event on a
//! broadcast channel. The latest line per controller (plus the last corrective
//! quantity typed in) is also kept on a watch channel so a display attaching
//! late can restore what it shows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::venue::{Direction, Venue};

/// Default number of buffered events per subscriber.
pub const DEFAULT_STATUS_CAPACITY: usize = 256;

/// Hedge controller status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HedgeStatus {
    Started {
        symbol: String,
    },
    /// Exposure is under the threshold.
    Monitoring {
        lighter: Decimal,
        variational: Decimal,
        net: Decimal,
    },
    /// A corrective order is outstanding; nothing is done this tick.
    Waiting {
        elapsed_ms: u64,
        timeout_ms: u64,
    },
    /// The lock expired and was released; monitoring resumes next tick.
    LockTimedOut {
        elapsed_ms: u64,
    },
    Hedging {
        venue: Venue,
        direction: Direction,
        quantity: String,
        net: Decimal,
    },
    Stopped,
    Error {
        message: String,
    },
}

impl HedgeStatus {
    /// Whether this status ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HedgeStatus::Stopped | HedgeStatus::Error { .. })
    }
}

impl fmt::Display for HedgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HedgeStatus::Started { symbol } => write!(f, "Hedge started for {}", symbol),
            HedgeStatus::Monitoring {
                lighter,
                variational,
                net,
            } => write!(
                f,
                "monitoring… L {} / V {} / net {}",
                lighter, variational, net
            ),
            HedgeStatus::Waiting {
                elapsed_ms,
                timeout_ms,
            } => write!(
                f,
                "waiting… corrective order in flight ({}ms of {}ms)",
                elapsed_ms, timeout_ms
            ),
            HedgeStatus::LockTimedOut { elapsed_ms } => write!(
                f,
                "lock timed out after {}ms, resuming monitoring",
                elapsed_ms
            ),
            HedgeStatus::Hedging {
                venue,
                direction,
                quantity,
                net,
            } => write!(
                f,
                "hedging… {} {} on {} (net {})",
                direction, quantity, venue, net
            ),
            HedgeStatus::Stopped => write!(f, "Stopped"),
            HedgeStatus::Error { message } => write!(f, "Error: {}", message),
        }
    }
}

/// Submit scheduler status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmitStatus {
    Started { total: u32 },
    /// Click `current` of `total` is being issued.
    Clicking { current: u32, total: u32 },
    Completed { total: u32 },
    Stopped { completed: u32, total: u32 },
    Error { message: String },
}

impl SubmitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmitStatus::Completed { .. } | SubmitStatus::Stopped { .. } | SubmitStatus::Error { .. }
        )
    }
}

impl fmt::Display for SubmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitStatus::Started { total } => write!(f, "Submitting {} clicks", total),
            SubmitStatus::Clicking { current, total } => {
                write!(f, "Clicking… ({}/{})", current, total)
            }
            SubmitStatus::Completed { .. } => write!(f, "Completed"),
            SubmitStatus::Stopped { .. } => write!(f, "Stopped"),
            SubmitStatus::Error { message } => write!(f, "Error: {}", message),
        }
    }
}

/// One event on the status stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "controller", content = "status", rename_all = "snake_case")]
pub enum StatusEvent {
    Hedge(HedgeStatus),
    Submit(SubmitStatus),
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Hedge(status) => write!(f, "[hedge] {}", status),
            StatusEvent::Submit(status) => write!(f, "[submit] {}", status),
        }
    }
}

/// What a display needs to redraw itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayState {
    pub hedge: Option<String>,
    pub submit: Option<String>,
    pub last_corrective_quantity: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fan-out point for controller statuses.
#[derive(Clone)]
pub struct StatusHub {
    events: broadcast::Sender<StatusEvent>,
    display: Arc<watch::Sender<DisplayState>>,
}

impl StatusHub {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        let (display, _) = watch::channel(DisplayState::default());
        Self {
            events,
            display: Arc::new(display),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    pub fn watch_display(&self) -> watch::Receiver<DisplayState> {
        self.display.subscribe()
    }

    pub fn display_state(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    pub fn publish_hedge(&self, status: HedgeStatus) {
        let line = status.to_string();
        self.display.send_modify(|state| {
            state.hedge = Some(line);
            state.updated_at = Some(Utc::now());
        });
        self.emit(StatusEvent::Hedge(status));
    }

    pub fn publish_submit(&self, status: SubmitStatus) {
        let line = status.to_string();
        self.display.send_modify(|state| {
            state.submit = Some(line);
            state.updated_at = Some(Utc::now());
        });
        self.emit(StatusEvent::Submit(status));
    }

    /// Remember the quantity last typed into the corrective venue.
    pub fn record_corrective_quantity(&self, quantity: &str) {
        self.display.send_modify(|state| {
            state.last_corrective_quantity = Some(quantity.to_string());
        });
    }

    fn emit(&self, event: StatusEvent) {
        // No subscribers is fine; the display state still holds the line.
        let _ = self.events.send(event);
    }
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_lines() {
        let hedging = HedgeStatus::Hedging {
            venue: Venue::Lighter,
            direction: Direction::Sell,
            quantity: "0.20000".to_string(),
            net: dec!(0.2),
        };
        assert_eq!(hedging.to_string(), "hedging… sell 0.20000 on Lighter (net 0.2)");
        assert_eq!(
            SubmitStatus::Clicking { current: 2, total: 3 }.to_string(),
            "Clicking… (2/3)"
        );
        assert_eq!(SubmitStatus::Completed { total: 3 }.to_string(), "Completed");
        assert_eq!(
            HedgeStatus::Error { message: "boom".into() }.to_string(),
            "Error: boom"
        );
        assert!(HedgeStatus::Stopped.is_terminal());
        assert!(!SubmitStatus::Clicking { current: 1, total: 1 }.is_terminal());
    }

    #[tokio::test]
    async fn test_hub_fans_out_and_keeps_display() {
        let hub = StatusHub::default();
        let mut rx = hub.subscribe();

        hub.publish_submit(SubmitStatus::Clicking { current: 1, total: 2 });
        hub.record_corrective_quantity("0.50000");
        hub.publish_hedge(HedgeStatus::Stopped);

        assert_eq!(
            rx.recv().await.unwrap(),
            StatusEvent::Submit(SubmitStatus::Clicking { current: 1, total: 2 })
        );
        assert_eq!(rx.recv().await.unwrap(), StatusEvent::Hedge(HedgeStatus::Stopped));

        let display = hub.display_state();
        assert_eq!(display.submit.as_deref(), Some("Clicking… (1/2)"));
        assert_eq!(display.hedge.as_deref(), Some("Stopped"));
        assert_eq!(display.last_corrective_quantity.as_deref(), Some("0.50000"));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(StatusEvent::Submit(SubmitStatus::Completed { total: 3 })).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "controller": "submit", "status": { "state": "completed", "total": 3 } })
        );
    }
}
