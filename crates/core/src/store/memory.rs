//! In-memory store backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Generation, SnapshotStore};
use crate::{Error, ResourceKey, Snapshot};

type Entries = BTreeMap<ResourceKey, Snapshot>;
type Generations = BTreeMap<String, Entries>;

/// In-memory snapshot store.
///
/// Writes happen under a single write lock, so same-key races resolve
/// last-writer-wins and a batch put is atomic by construction.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Generations>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn open(&self, label: &str) -> Result<Arc<dyn Generation>, Error> {
        let mut inner = self.inner.write().await;
        inner.entry(label.to_string()).or_default();
        Ok(Arc::new(MemoryGeneration {
            label: label.to_string(),
            inner: Arc::clone(&self.inner),
        }))
    }

    async fn labels(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.read().await.keys().cloned().collect())
    }

    async fn remove(&self, label: &str) -> Result<bool, Error> {
        Ok(self.inner.write().await.remove(label).is_some())
    }
}

struct MemoryGeneration {
    label: String,
    inner: Arc<RwLock<Generations>>,
}

impl MemoryGeneration {
    fn removed(&self) -> Error {
        Error::Store(format!("generation {} was removed", self.label))
    }
}

#[async_trait]
impl Generation for MemoryGeneration {
    fn label(&self) -> &str {
        &self.label
    }

    async fn put(&self, key: &ResourceKey, snapshot: Snapshot) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        let entries = inner.get_mut(&self.label).ok_or_else(|| self.removed())?;
        entries.insert(key.clone(), snapshot);
        Ok(())
    }

    async fn put_all(&self, entries: Vec<(ResourceKey, Snapshot)>) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        let stored = inner.get_mut(&self.label).ok_or_else(|| self.removed())?;
        stored.extend(entries);
        Ok(())
    }

    async fn lookup(&self, key: &ResourceKey) -> Result<Option<Snapshot>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.get(&self.label).and_then(|entries| entries.get(key)).cloned())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<bool, Error> {
        let mut inner = self.inner.write().await;
        let entries = inner.get_mut(&self.label).ok_or_else(|| self.removed())?;
        Ok(entries.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<ResourceKey>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .get(&self.label)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}
