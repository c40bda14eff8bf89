//! Store lifecycle management.
//!
//! Owns the install/activate cycle of the versioned store: creating the
//! current generation, pre-populating the seed asset list, and pruning
//! every superseded generation. Population failures are never fatal; the
//! worker starts with whatever could be stored.

use std::sync::Arc;

use outpost_client::transport::{FetchOptions, Transport};
use outpost_client::url::{SeedUrl, resolve_seed};
use outpost_core::{Error, Generation, ResourceRequest, SnapshotStore};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Bound on concurrent external seed fetches.
const EXTERNAL_FETCH_CONCURRENCY: usize = 4;

/// Creates, seeds and prunes store generations.
pub struct LifecycleManager {
    store: Arc<dyn SnapshotStore>,
    transport: Arc<dyn Transport>,
    origin: Url,
    generation: String,
    seed_assets: Vec<String>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        transport: Arc<dyn Transport>,
        origin: Url,
        generation: impl Into<String>,
        seed_assets: Vec<String>,
    ) -> Self {
        Self {
            store,
            transport,
            origin,
            generation: generation.into(),
            seed_assets,
        }
    }

    /// Create and pre-populate the current generation.
    ///
    /// Same-origin seeds are populated as a unit: every member must fetch
    /// with a success status and the batch is written in one call. Any
    /// failure skips the whole local set with a warning. External seeds
    /// are fetched concurrently; each failure is isolated. Returns after
    /// all population attempts have finished.
    ///
    /// # Errors
    ///
    /// Fails only when the generation itself cannot be opened; population
    /// failures are logged and swallowed.
    pub async fn install(&self) -> Result<(), Error> {
        let current = self.store.open(&self.generation).await?;
        tracing::info!("installing generation {}", self.generation);

        let mut local = Vec::new();
        let mut external = Vec::new();
        for member in &self.seed_assets {
            match resolve_seed(&self.origin, member) {
                Ok(SeedUrl::Local(url)) => local.push(url),
                Ok(SeedUrl::External(url)) => external.push(url),
                Err(err) => tracing::warn!("ignoring seed {member}: {err}"),
            }
        }

        match self.populate_local(current.as_ref(), &local).await {
            Ok(()) => tracing::info!("populated {} local seed assets", local.len()),
            Err(err) => tracing::warn!("local seed population skipped: {err}"),
        }

        self.populate_external(&current, external).await;

        Ok(())
    }

    /// Promote this generation: delete every other label.
    ///
    /// Each deletion is attempted independently; a failure is logged and
    /// does not abort cleanup of the remaining labels.
    ///
    /// # Errors
    ///
    /// Fails only when the labels cannot be enumerated at all.
    pub async fn activate(&self) -> Result<(), Error> {
        for label in self.store.labels().await? {
            if label == self.generation {
                continue;
            }
            match self.store.remove(&label).await {
                Ok(_) => tracing::info!("removed stale generation {label}"),
                Err(err) => tracing::warn!("could not remove stale generation {label}: {err}"),
            }
        }
        Ok(())
    }

    async fn populate_local(&self, current: &dyn Generation, urls: &[Url]) -> Result<(), Error> {
        let mut entries = Vec::with_capacity(urls.len());
        for url in urls {
            let request = ResourceRequest::get(url.clone());
            let snapshot = self.transport.fetch(&request, FetchOptions::default()).await?;
            if !snapshot.is_success() {
                return Err(Error::Unreachable(format!(
                    "seed {url} returned status {}",
                    snapshot.status
                )));
            }
            entries.push((request.key(), snapshot));
        }
        current.put_all(entries).await
    }

    async fn populate_external(&self, current: &Arc<dyn Generation>, urls: Vec<Url>) {
        if urls.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(EXTERNAL_FETCH_CONCURRENCY));
        let mut join_set = JoinSet::new();

        for url in urls {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let transport = Arc::clone(&self.transport);
            let current = Arc::clone(current);

            join_set.spawn(async move {
                let _permit = permit;
                let request = ResourceRequest::get(url.clone());
                match transport.fetch(&request, FetchOptions::default()).await {
                    Ok(snapshot) if snapshot.is_success() => {
                        if let Err(err) = current.put(&request.key(), snapshot).await {
                            tracing::warn!("external seed {url} store write failed: {err}");
                        }
                    }
                    Ok(snapshot) => {
                        tracing::warn!("external seed {url} returned status {}", snapshot.status);
                    }
                    Err(err) => tracing::warn!("external seed {url} unreachable: {err}"),
                }
            });
        }

        while join_set.join_next().await.is_some() {}
    }
}
