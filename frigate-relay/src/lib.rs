//! frigate-relay library crate.
//!
//! Relays Frigate detection events from MQTT into a Telegram chat and exposes
//! an operator command surface in the same chat. The binary wires these
//! modules together; they are public for integration testing.

pub mod bot;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod health;
pub mod logging;
pub mod notification;
pub mod panic_hook;
pub mod relay;
pub mod state;
pub mod utils;

pub use error::{Error, Result};
