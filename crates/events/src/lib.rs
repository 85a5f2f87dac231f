//! Event system for Tempo
//!
//! This crate provides the event bus and event types used to broadcast
//! session and phase transitions to connected clients.

mod bus;
mod types;

pub use bus::{EventBus, RoomReceiver};
pub use types::*;
