//! Host-facing worker surface.
//!
//! The host environment drives the worker through four notifications:
//! install, activate, intercepted request, and message. The worker signals
//! back through the injected [`HostControl`] capability.

use std::sync::Arc;

use outpost_client::transport::Transport;
use outpost_core::{AppConfig, Error, Method, ResourceKey, ResourceRequest, Snapshot, SnapshotStore};

use crate::lifecycle::LifecycleManager;
use crate::router::{Router, Strategy};
use crate::strategy::StrategyExecutor;
use crate::tasks::BackgroundTasks;

/// The one recognized message command: promote this instance immediately
/// instead of waiting for the next load.
pub const SKIP_WAITING: &str = "skip-waiting";

/// Lifecycle signals the worker can send to its host.
pub trait HostControl: Send + Sync {
    /// End any waiting state for this instance.
    fn skip_waiting(&self);

    /// Route activity from already-open pages to this instance.
    fn claim_clients(&self);
}

/// The offline-caching agent.
pub struct OfflineWorker {
    lifecycle: LifecycleManager,
    router: Router,
    executor: StrategyExecutor,
    tasks: BackgroundTasks,
    host: Arc<dyn HostControl>,
}

impl OfflineWorker {
    /// Wire a worker from configuration and the injected capabilities.
    ///
    /// # Errors
    ///
    /// Fails when the configured origin or entry document does not form a
    /// valid URL.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn SnapshotStore>,
        transport: Arc<dyn Transport>,
        host: Arc<dyn HostControl>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url()?;
        let entry_url = origin
            .join(&config.entry_document)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.entry_document)))?;
        let entry_key = ResourceKey::new(Method::Get, &entry_url);

        let tasks = BackgroundTasks::new();
        let lifecycle = LifecycleManager::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            origin.clone(),
            config.generation.clone(),
            config.seed_assets.clone(),
        );
        let router = Router::new(
            origin,
            config.entry_document.clone(),
            config.manifest.clone(),
            config.revalidate_shell,
        );
        let executor = StrategyExecutor::new(
            store,
            transport,
            config.generation.clone(),
            entry_key,
            config.entry_document.clone(),
            tasks.clone(),
        );

        Ok(Self { lifecycle, router, executor, tasks, host })
    }

    /// Install notification: create and seed the current generation, then
    /// ask the host to skip any waiting state. Population failures are
    /// logged and never block installation.
    pub async fn on_install(&self) {
        if let Err(err) = self.lifecycle.install().await {
            tracing::warn!("install could not open the store: {err}");
        }
        self.host.skip_waiting();
    }

    /// Activation notification: prune stale generations, then claim
    /// already-open pages.
    pub async fn on_activate(&self) {
        if let Err(err) = self.lifecycle.activate().await {
            tracing::warn!("stale generation cleanup failed: {err}");
        }
        self.host.claim_clients();
    }

    /// Intercepted request notification. Always resolves to a response
    /// snapshot; the worst case is a synthesized 503.
    pub async fn on_intercept(&self, request: &ResourceRequest) -> Snapshot {
        let strategy = self.router.classify(request);
        tracing::debug!(
            "{request} classified {:?} -> {strategy:?}",
            self.router.classification(request)
        );

        match strategy {
            Strategy::RefreshFirst => match self.executor.refresh_first(request).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    tracing::debug!("refresh-first left {} unresolved: {err}", request.url);
                    Snapshot::unavailable()
                }
            },
            Strategy::RevalidateFirst => self.executor.revalidate_first(request).await,
            Strategy::CacheFirstBgRefresh => self.executor.cache_first_bg_refresh(request).await,
        }
    }

    /// Generic message notification. Exactly one command is recognized;
    /// anything else is ignored.
    pub fn on_message(&self, command: &str) {
        if command == SKIP_WAITING {
            self.host.skip_waiting();
        } else {
            tracing::debug!("ignoring unrecognized message: {command}");
        }
    }

    /// Wait for registered background work (refresh writes) to finish.
    /// Used by hosts that are shutting down, and by tests.
    pub async fn wait_idle(&self) {
        self.tasks.wait_idle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, RecordingHost, ok_snapshot};
    use outpost_client::transport::CacheMode;
    use outpost_core::MemoryStore;
    use url::Url;

    fn config() -> AppConfig {
        AppConfig {
            origin: "https://app.example.com".into(),
            generation: "app-v3".into(),
            seed_assets: vec![
                "./".into(),
                "index.html".into(),
                "manifest.json".into(),
                "https://cdn.example.net/chart.js".into(),
            ],
            ..Default::default()
        }
    }

    async fn seeded_transport() -> Arc<FakeTransport> {
        let transport = FakeTransport::new();
        transport
            .respond("https://app.example.com/", ok_snapshot("root"))
            .await;
        transport
            .respond("https://app.example.com/index.html", ok_snapshot("index"))
            .await;
        transport
            .respond("https://app.example.com/manifest.json", ok_snapshot("{}"))
            .await;
        transport
            .respond("https://cdn.example.net/chart.js", ok_snapshot("chart"))
            .await;
        transport
    }

    fn worker(
        store: &MemoryStore,
        transport: &Arc<FakeTransport>,
        host: &Arc<RecordingHost>,
    ) -> OfflineWorker {
        OfflineWorker::new(
            &config(),
            Arc::new(store.clone()),
            Arc::clone(transport) as Arc<dyn Transport>,
            Arc::clone(host) as Arc<dyn HostControl>,
        )
        .unwrap()
    }

    fn request(url: &str) -> ResourceRequest {
        ResourceRequest::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_install_seeds_and_skips_waiting() {
        let store = MemoryStore::new();
        let transport = seeded_transport().await;
        let host = RecordingHost::new();

        let worker = worker(&store, &transport, &host);
        worker.on_install().await;

        assert_eq!(host.skip_waiting_count(), 1);
        let current = store.open("app-v3").await.unwrap();
        assert_eq!(current.keys().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_activate_prunes_and_claims() {
        let store = MemoryStore::new();
        store.open("app-v2").await.unwrap();
        store.open("app-v3").await.unwrap();
        let transport = seeded_transport().await;
        let host = RecordingHost::new();

        let worker = worker(&store, &transport, &host);
        worker.on_activate().await;

        assert_eq!(host.claim_clients_count(), 1);
        assert_eq!(store.labels().await.unwrap(), vec!["app-v3".to_string()]);
    }

    #[tokio::test]
    async fn test_intercept_shell_revalidates() {
        let store = MemoryStore::new();
        let transport = seeded_transport().await;
        let host = RecordingHost::new();

        let worker = worker(&store, &transport, &host);
        let resolved = worker.on_intercept(&request("https://app.example.com/index.html")).await;

        assert_eq!(resolved.body, "index".as_bytes());
        let calls = transport.calls().await;
        assert_eq!(calls.last().unwrap().1.cache, CacheMode::Reload);
    }

    #[tokio::test]
    async fn test_intercept_always_resolves() {
        let store = MemoryStore::new();
        let transport = FakeTransport::new();
        let host = RecordingHost::new();

        let worker = worker(&store, &transport, &host);
        let resolved = worker
            .on_intercept(&request("https://cdn.example.net/unknown.js"))
            .await;

        assert_eq!(resolved.status, 503);
        assert!(!resolved.body.is_empty());
    }

    #[tokio::test]
    async fn test_offline_after_install_serves_entry_document() {
        let store = MemoryStore::new();
        let transport = seeded_transport().await;
        let host = RecordingHost::new();

        let worker = worker(&store, &transport, &host);
        worker.on_install().await;
        worker.on_activate().await;

        // the network goes away entirely
        transport.fail("https://app.example.com/index.html").await;
        transport.fail("https://app.example.com/").await;

        let resolved = worker.on_intercept(&request("https://app.example.com/index.html")).await;
        assert_eq!(resolved.body, "index".as_bytes());

        let root = worker.on_intercept(&request("https://app.example.com/")).await;
        assert_eq!(root.body, "root".as_bytes());

        worker.wait_idle().await;
    }

    #[tokio::test]
    async fn test_intercept_asset_served_from_store_and_refreshed() {
        let store = MemoryStore::new();
        let transport = seeded_transport().await;
        let host = RecordingHost::new();

        let worker = worker(&store, &transport, &host);
        worker.on_install().await;

        transport
            .respond("https://cdn.example.net/chart.js", ok_snapshot("chart-v2"))
            .await;

        let resolved = worker
            .on_intercept(&request("https://cdn.example.net/chart.js"))
            .await;
        assert_eq!(resolved.body, "chart".as_bytes());

        worker.wait_idle().await;
        let current = store.open("app-v3").await.unwrap();
        let key = request("https://cdn.example.net/chart.js").key();
        let refreshed = current.lookup(&key).await.unwrap().unwrap();
        assert_eq!(refreshed.body, "chart-v2".as_bytes());
    }

    #[tokio::test]
    async fn test_on_message_commands() {
        let store = MemoryStore::new();
        let transport = FakeTransport::new();
        let host = RecordingHost::new();

        let worker = worker(&store, &transport, &host);

        worker.on_message(SKIP_WAITING);
        assert_eq!(host.skip_waiting_count(), 1);

        worker.on_message("unknown-command");
        assert_eq!(host.skip_waiting_count(), 1);
    }
}
