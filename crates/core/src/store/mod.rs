//! Versioned snapshot store capability.
//!
//! The store is a set of named generations, each an open-ended map from
//! normalized request identities to response snapshots. At most one
//! generation is current at a time; superseded generations are deleted
//! wholesale at activation. Two backends are provided:
//!
//! - [`MemoryStore`] for tests and hosts that do not need persistence
//! - [`SqliteStore`] for persistent storage with WAL-mode concurrency

pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Error, ResourceKey, Snapshot};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One named snapshot namespace, identified by its version label.
///
/// Concurrent puts to the same key resolve last-writer-wins; no partial
/// write is ever observable.
#[async_trait]
pub trait Generation: Send + Sync {
    /// Version label this generation was opened under.
    fn label(&self) -> &str;

    /// Store a snapshot under a key, overwriting any previous entry.
    async fn put(&self, key: &ResourceKey, snapshot: Snapshot) -> Result<(), Error>;

    /// Store a batch of entries as a unit; either all land or none do.
    async fn put_all(&self, entries: Vec<(ResourceKey, Snapshot)>) -> Result<(), Error>;

    /// Snapshot stored under a key, if any. Absence is not an error.
    async fn lookup(&self, key: &ResourceKey) -> Result<Option<Snapshot>, Error>;

    /// Remove one entry; returns whether it existed.
    async fn delete(&self, key: &ResourceKey) -> Result<bool, Error>;

    /// Every key currently stored in this generation.
    async fn keys(&self) -> Result<Vec<ResourceKey>, Error>;
}

/// Store of snapshot generations.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Open the generation with the given label, creating it if absent.
    async fn open(&self, label: &str) -> Result<Arc<dyn Generation>, Error>;

    /// Labels of every generation currently present.
    async fn labels(&self) -> Result<Vec<String>, Error>;

    /// Delete an entire generation; returns whether it existed.
    async fn remove(&self, label: &str) -> Result<bool, Error>;
}
