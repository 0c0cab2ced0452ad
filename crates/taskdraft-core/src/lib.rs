//! Draft persistence logic and port definitions.
//!
//! This crate defines the `KeyValueBackend` port that the infrastructure
//! layer implements, plus everything built on top of it: the storage
//! adapter, codec, validators, draft store, registry, auto-save scheduler,
//! recovery controller and editing session. It depends only on
//! `taskdraft-types` -- never on `taskdraft-infra` or any database crate.

pub mod autosave;
pub mod draft;
pub mod event;
pub mod recovery;
pub mod session;
pub mod storage;
pub mod task;
