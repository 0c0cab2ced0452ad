//! Debounced auto-save scheduling.

pub mod scheduler;

pub use scheduler::{AutoSaveScheduler, SchedulerState};
