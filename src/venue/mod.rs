//! Venue integrations for order-form automation.
//!
//! ## Adapters
//! - `PaperVenue`: in-memory order form for dry runs and tests
//! - `BridgeSession`: a browser session driven through the automation bridge
//!
//! ## Locators
//! - `SessionRegistry`: sessions opened explicitly in-process
//! - `BridgeLocator`: sessions discovered from the bridge by page URL

pub mod bridge;
mod paper;
mod registry;
mod traits;
mod types;

pub use bridge::{BridgeLocator, BridgeSession, BridgeSessionInfo};
pub use paper::{PaperOrder, PaperVenue};
pub use registry::SessionRegistry;
pub use traits::*;
pub use types::*;
