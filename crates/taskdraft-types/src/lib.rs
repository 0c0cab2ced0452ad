//! Shared domain types for task draft persistence.
//!
//! This crate contains the types used across the draft subsystem:
//! form payloads, storage keys, draft records, registry metadata,
//! notification events, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, chrono, thiserror.

pub mod config;
pub mod draft;
pub mod error;
pub mod event;
pub mod form;
pub mod task;
