//! Controllers and the surface that drives them.
//!
//! - `HedgeController`: periodic delta-neutral rebalancing on the corrective venue
//! - `SubmitScheduler`: bounded, jittered submit clicks across both venues
//! - `ManualDesk`: one-shot manual order actions
//! - `ControlSurface`: start/stop facade plus the status stream

mod hedge;
mod manual;
mod run;
mod status;
mod submit;
mod surface;

pub use hedge::{HedgeController, HedgeParams, HedgeSettings};
pub use manual::{ManualDesk, VenueSnapshot};
pub use status::{
    DisplayState, HedgeStatus, StatusEvent, StatusHub, SubmitStatus, DEFAULT_STATUS_CAPACITY,
};
pub use submit::{IntervalSampler, SubmitParams, SubmitScheduler};
pub use surface::ControlSurface;
