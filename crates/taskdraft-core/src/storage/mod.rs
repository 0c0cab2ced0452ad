//! Storage abstractions for draft persistence.
//!
//! Defines the `KeyValueBackend` port, an in-memory implementation, and the
//! `StorageAdapter` that turns backend failures into sentinels.
//! Durable implementations live in taskdraft-infra.

pub mod adapter;
pub mod backend;
pub mod memory;

pub use adapter::StorageAdapter;
pub use backend::KeyValueBackend;
pub use memory::MemoryBackend;
