//! The outpost offline-caching agent.
//!
//! Intercepts an application's resource requests and answers each one from
//! a versioned snapshot store, the network, or both. The crate composes
//! three pieces behind the host-facing worker surface:
//!
//! - [`lifecycle`]: generation creation, seed population, stale pruning
//! - [`router`]: classification of requests into strategy buckets
//! - [`strategy`]: the fetch/cache strategies themselves

pub mod lifecycle;
pub mod router;
pub mod strategy;
pub mod tasks;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use lifecycle::LifecycleManager;
pub use router::{Classification, Router, Strategy};
pub use strategy::StrategyExecutor;
pub use tasks::BackgroundTasks;
pub use worker::{HostControl, OfflineWorker, SKIP_WAITING};
