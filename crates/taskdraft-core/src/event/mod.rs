//! Event bus for draft notifications.
//!
//! Provides an `EventBus` that distributes `DraftEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
