//! Fetch/cache strategy execution.
//!
//! Three strategies, each resolving an intercepted request to a snapshot:
//!
//! - refresh-first: network, then store
//! - revalidate-first: network with cache bypass, then store, then the
//!   entry document, then a synthesized response
//! - cache-first with background refresh: store, with the network used to
//!   repair the store without delaying the response
//!
//! Every write duplicates the snapshot before branching, so the returned
//! response and the stored entry never share a consumable body. Store
//! faults never fail a resolution; they are logged and the strategy
//! continues as if the store had missed.

use std::sync::Arc;

use outpost_client::transport::{FetchOptions, Transport};
use outpost_core::{Error, Generation, ResourceKey, ResourceRequest, Snapshot, SnapshotStore};

use crate::router::is_entry_path;
use crate::tasks::BackgroundTasks;

/// Executes fetch/cache strategies against the current generation.
pub struct StrategyExecutor {
    store: Arc<dyn SnapshotStore>,
    transport: Arc<dyn Transport>,
    generation: String,
    entry_key: ResourceKey,
    entry_document: String,
    tasks: BackgroundTasks,
}

impl StrategyExecutor {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        transport: Arc<dyn Transport>,
        generation: impl Into<String>,
        entry_key: ResourceKey,
        entry_document: impl Into<String>,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            store,
            transport,
            generation: generation.into(),
            entry_key,
            entry_document: entry_document.into(),
            tasks,
        }
    }

    /// Network first; on a resolved response store a duplicate and return
    /// the live response. On network failure fall back to the stored entry.
    ///
    /// # Errors
    ///
    /// Returns the network error when the fetch fails and nothing is
    /// stored under the request key. Callers must treat this as a possible
    /// outcome, not assume a response always materializes.
    pub async fn refresh_first(&self, request: &ResourceRequest) -> Result<Snapshot, Error> {
        self.network_first(request, FetchOptions::default()).await
    }

    /// Like refresh-first, but the fetch bypasses intermediate HTTP caches
    /// and the fallback chain ends in the entry document and a synthesized
    /// response instead of an error.
    pub async fn revalidate_first(&self, request: &ResourceRequest) -> Snapshot {
        match self.network_first(request, FetchOptions::reload()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::debug!("falling back to entry document for {}: {err}", request.url);
                match self.lookup(&self.entry_key).await {
                    Some(stored) => stored,
                    None => Snapshot::unavailable(),
                }
            }
        }
    }

    /// Serve from the store when possible, refreshing the entry in the
    /// background; fetch on a miss. Always resolves.
    pub async fn cache_first_bg_refresh(&self, request: &ResourceRequest) -> Snapshot {
        let key = request.key();

        if let Some(stored) = self.lookup(&key).await {
            self.refresh_in_background(request.clone(), key).await;
            return stored;
        }

        match self.transport.fetch(request, FetchOptions::default()).await {
            Ok(snapshot) => {
                // misses are stored only when the response reports success
                if snapshot.is_success() {
                    self.store_snapshot(&key, snapshot.clone()).await;
                }
                snapshot
            }
            Err(err) => {
                tracing::debug!("offline miss for {}: {err}", request.url);
                if is_entry_path(request.url.path(), &self.entry_document)
                    && let Some(stored) = self.lookup(&self.entry_key).await
                {
                    return stored;
                }
                Snapshot::unavailable()
            }
        }
    }

    async fn network_first(
        &self,
        request: &ResourceRequest,
        options: FetchOptions,
    ) -> Result<Snapshot, Error> {
        let key = request.key();
        match self.transport.fetch(request, options).await {
            Ok(snapshot) => {
                self.store_snapshot(&key, snapshot.clone()).await;
                Ok(snapshot)
            }
            Err(err) => {
                tracing::debug!("network failed for {}, trying store: {err}", request.url);
                match self.lookup(&key).await {
                    Some(stored) => Ok(stored),
                    None => Err(err),
                }
            }
        }
    }

    /// Register a refresh of `key` that outlives the current resolution.
    /// Only success responses overwrite the entry; every failure mode is
    /// ignored, leaving the served snapshot authoritative.
    async fn refresh_in_background(&self, request: ResourceRequest, key: ResourceKey) {
        let store = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let generation = self.generation.clone();

        self.tasks
            .extend(async move {
                match transport.fetch(&request, FetchOptions::default()).await {
                    Ok(snapshot) if snapshot.is_success() => match store.open(&generation).await {
                        Ok(current) => {
                            if let Err(err) = current.put(&key, snapshot).await {
                                tracing::debug!("background refresh write failed for {key}: {err}");
                            }
                        }
                        Err(err) => {
                            tracing::debug!("background refresh could not open store: {err}");
                        }
                    },
                    Ok(snapshot) => {
                        tracing::debug!(
                            "background refresh for {key} returned status {}",
                            snapshot.status
                        );
                    }
                    Err(err) => {
                        tracing::debug!("background refresh failed for {key}: {err}");
                    }
                }
            })
            .await;
    }

    async fn current(&self) -> Result<Arc<dyn Generation>, Error> {
        self.store.open(&self.generation).await
    }

    async fn store_snapshot(&self, key: &ResourceKey, snapshot: Snapshot) {
        match self.current().await {
            Ok(current) => {
                if let Err(err) = current.put(key, snapshot).await {
                    tracing::warn!("store write failed for {key}: {err}");
                }
            }
            Err(err) => tracing::warn!("could not open generation {}: {err}", self.generation),
        }
    }

    async fn lookup(&self, key: &ResourceKey) -> Option<Snapshot> {
        match self.current().await {
            Ok(current) => match current.lookup(key).await {
                Ok(found) => found,
                Err(err) => {
                    tracing::warn!("store lookup failed for {key}: {err}");
                    None
                }
            },
            Err(err) => {
                tracing::warn!("could not open generation {}: {err}", self.generation);
                None
            }
        }
    }
}
