//! Background task registry.
//!
//! Stands in for the host's extend-lifetime mechanism: work registered here
//! (background refresh writes, mostly) runs to completion even when the
//! request that started it has already resolved.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Registry of spawned background tasks.
///
/// Cloning shares the registry; all clones see the same set of handles.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task whose lifetime extends past the operation registering it.
    pub async fn extend<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut handles = self.handles.lock().await;
        handles.retain(|handle| !handle.is_finished());
        handles.push(tokio::spawn(task));
    }

    /// Wait until every registered task has run to completion, including
    /// tasks registered while draining.
    pub async fn wait_idle(&self) {
        loop {
            let drained: Vec<JoinHandle<()>> = {
                let mut handles = self.handles.lock().await;
                std::mem::take(&mut *handles)
            };
            if drained.is_empty() {
                break;
            }
            for handle in drained {
                if let Err(err) = handle.await
                    && err.is_panic()
                {
                    tracing::warn!("background task panicked: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_extend_runs_to_completion() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            tasks
                .extend(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        tasks.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_idle_when_empty() {
        let tasks = BackgroundTasks::new();
        tasks.wait_idle().await;
    }

    #[tokio::test]
    async fn test_clones_share_registry() {
        let tasks = BackgroundTasks::new();
        let clone = tasks.clone();
        let counter = Arc::new(AtomicUsize::new(0));

        let task_counter = Arc::clone(&counter);
        clone
            .extend(async move {
                task_counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tasks.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
