//! # Dual-Venue Hedger
//!
//! Order-form automation across two perpetual venues, Lighter and Variational.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `control`: Hedge controller, submit scheduler, manual desk and status stream
//! - `venue`: Venue adapter and session locator seams, paper and bridge backends
//! - `error`: Controller error type
//! - `utils`: Shared utilities and decimal parsing/formatting

pub mod config;
pub mod control;
pub mod error;
pub mod utils;
pub mod venue;

pub use config::Config;
pub use control::ControlSurface;
pub use error::ControlError;
