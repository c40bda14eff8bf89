//! outpost driver binary.
//!
//! Runs an install/activate cycle against the configured origin, then
//! resolves one URL per stdin line through the interception path, printing
//! a status line per resolution. Logging goes to stderr so stdout stays a
//! clean status-line protocol.

use std::sync::Arc;

use anyhow::Result;
use outpost_client::transport::{HttpTransport, TransportConfig};
use outpost_client::url::canonicalize;
use outpost_core::{AppConfig, ResourceRequest, SqliteStore};
use outpost_worker::{HostControl, OfflineWorker};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Host control for a standalone run: there are no pages to claim, so the
/// signals are only logged.
struct StandaloneHost;

impl HostControl for StandaloneHost {
    fn skip_waiting(&self) {
        tracing::info!("skip-waiting requested");
    }

    fn claim_clients(&self) {
        tracing::info!("claiming clients");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        "starting outpost for {} (generation {})",
        config.origin,
        config.generation
    );

    let store = Arc::new(SqliteStore::open(&config.db_path).await?);
    let transport = Arc::new(HttpTransport::new(TransportConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    })?);
    let worker = OfflineWorker::new(&config, store, transport, Arc::new(StandaloneHost))?;

    worker.on_install().await;
    worker.on_activate().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match canonicalize(line) {
            Ok(url) => {
                let request = ResourceRequest::get(url);
                let snapshot = worker.on_intercept(&request).await;
                println!("{} {} ({} bytes)", snapshot.status, request.url, snapshot.body.len());
            }
            Err(err) => eprintln!("skipping {line}: {err}"),
        }
    }

    worker.wait_idle().await;

    Ok(())
}
