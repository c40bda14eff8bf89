//! Test doubles shared by the worker tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use outpost_client::transport::{FetchOptions, Transport};
use outpost_core::{Error, ResourceRequest, Snapshot};
use tokio::sync::{Mutex, Semaphore};

use crate::worker::HostControl;

/// Scripted transport.
///
/// `respond`/`fail` install a sticky reply for a URL, replacing whatever
/// was scripted before. `respond_sequence` queues replies answered in
/// order, the last one sticky. URLs with no script resolve to a network
/// failure.
pub(crate) struct FakeTransport {
    replies: Mutex<BTreeMap<String, VecDeque<Result<Snapshot, String>>>>,
    calls: Mutex<Vec<(String, FetchOptions)>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        })
    }

    pub async fn respond(&self, url: &str, snapshot: Snapshot) {
        let mut replies = self.replies.lock().await;
        replies.insert(url.to_string(), VecDeque::from([Ok(snapshot)]));
    }

    pub async fn respond_sequence(&self, url: &str, snapshots: Vec<Snapshot>) {
        let mut replies = self.replies.lock().await;
        replies.insert(url.to_string(), snapshots.into_iter().map(Ok).collect());
    }

    pub async fn fail(&self, url: &str) {
        let mut replies = self.replies.lock().await;
        replies.insert(
            url.to_string(),
            VecDeque::from([Err("scripted network failure".to_string())]),
        );
    }

    /// Make every fetch block until a permit is released on the returned
    /// semaphore.
    pub async fn gate(&self) -> Arc<Semaphore> {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock().await = Some(Arc::clone(&semaphore));
        semaphore
    }

    pub async fn calls(&self) -> Vec<(String, FetchOptions)> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(
        &self,
        request: &ResourceRequest,
        options: FetchOptions,
    ) -> Result<Snapshot, Error> {
        let gate = self.gate.lock().await.clone();
        if let Some(gate) = gate {
            let Ok(permit) = gate.acquire().await else {
                return Err(Error::Unreachable("gate closed".to_string()));
            };
            permit.forget();
        }

        self.calls
            .lock()
            .await
            .push((request.url.to_string(), options));

        let mut replies = self.replies.lock().await;
        let Some(queue) = replies.get_mut(request.url.as_str()) else {
            return Err(Error::Unreachable(format!("no route to {}", request.url)));
        };

        let reply = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };

        match reply {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(msg)) => Err(Error::Unreachable(msg)),
            None => Err(Error::Unreachable("script exhausted".to_string())),
        }
    }
}

/// Host control double counting the signals it receives.
#[derive(Default)]
pub(crate) struct RecordingHost {
    skip_waiting: AtomicUsize,
    claim_clients: AtomicUsize,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn skip_waiting_count(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn claim_clients_count(&self) -> usize {
        self.claim_clients.load(Ordering::SeqCst)
    }
}

impl HostControl for RecordingHost {
    fn skip_waiting(&self) {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
    }

    fn claim_clients(&self) {
        self.claim_clients.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build a 200 text snapshot with the given body.
pub(crate) fn ok_snapshot(body: &str) -> Snapshot {
    Snapshot::new(
        200,
        vec![("content-type".to_string(), "text/html".to_string())],
        body.as_bytes().to_vec(),
    )
}

/// Build a snapshot with an arbitrary status.
pub(crate) fn status_snapshot(status: u16, body: &str) -> Snapshot {
    Snapshot::new(status, Vec::new(), body.as_bytes().to_vec())
}
