//! Core types and shared functionality for outpost.
//!
//! This crate provides:
//! - The snapshot data model: requests, normalized keys, captured responses
//! - The versioned snapshot store capability with in-memory and SQLite backends
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod request;
pub mod snapshot;
pub mod store;

pub use config::AppConfig;
pub use error::Error;
pub use request::{Method, ResourceKey, ResourceRequest};
pub use snapshot::Snapshot;
pub use store::{Generation, MemoryStore, SnapshotStore, SqliteStore};
