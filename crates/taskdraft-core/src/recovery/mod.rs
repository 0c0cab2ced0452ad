//! Start-of-session draft recovery.

pub mod controller;

pub use controller::{
    RecoveryController, RecoveryDecision, RecoveryError, RecoveryNotice, RecoveryOutcome,
    RecoveryState,
};
