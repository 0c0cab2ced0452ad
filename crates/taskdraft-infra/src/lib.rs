//! Infrastructure layer for taskdraft.
//!
//! Contains the SQLite implementation of the `KeyValueBackend` port defined
//! in `taskdraft-core`, the `config.toml` loader and data directory
//! resolution.

pub mod config;
pub mod filesystem;
pub mod sqlite;
