//! Route projection engine
//!
//! This library provides:
//! - Scope filtering of Ingresses by class
//! - Projection of Ingresses and their backend Services into a shared Secret
//! - Finalizer management so projections are removed before Ingresses are
//! - Optimistic-concurrency conflict handling by requeue

pub mod client;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod finalizer;
pub mod keys;
pub mod metrics;
pub mod scope;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use client::{ApiError, ClusterClient, KubeClusterClient};
pub use config::SyncConfig;
pub use error::{CoreError, Result};
pub use metrics::SyncMetrics;
pub use sync::{SyncEngine, SyncEvent, SyncOutcome};
