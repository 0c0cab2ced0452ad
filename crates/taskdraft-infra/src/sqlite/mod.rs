//! SQLite storage layer.
//!
//! The draft key-value backend, backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod kv;
pub mod pool;
