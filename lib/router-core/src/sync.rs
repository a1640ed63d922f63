//! Projection sync engine
//!
//! Each call advances a route definition's projection by at most one
//! cluster write and reports whether the caller should come back:
//!
//! - upsert: create the store, then write each backend Service entry that
//!   is out of date, then add the finalizer, then write the route's own entry
//! - teardown: remove the route's entry, then remove the finalizer
//!
//! Entries that already hold the current bytes are skipped without a write,
//! so repeated passes converge and then stop writing. A version conflict on
//! any write is a requeue, never an error: the next pass re-reads and
//! re-derives its change.

use crate::client::ClusterClient;
use crate::config::SyncConfig;
use crate::dependencies;
use crate::finalizer;
use crate::keys;
use crate::metrics::{SyncMetrics, SyncPath};
use crate::scope;
use crate::store::{ProjectionStore, StoreLookup, WriteOutcome};
use crate::{CoreError, Result};
use router_api::{ResourceIdentity, RouteDefinition, INGRESS_FINALIZER};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What the caller should do after a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Converged; wait for the next change
    Done,
    /// Progress was made or a race was lost; run again
    Requeue,
}

/// A change observed for a route definition
#[derive(Clone, Debug)]
pub enum SyncEvent {
    /// The route was created or updated
    Upsert(RouteDefinition),
    /// The route is deleting or already gone
    Delete {
        identity: ResourceIdentity,
        route: Option<RouteDefinition>,
    },
}

impl SyncEvent {
    /// Classify an observed object by its deletion marker
    pub fn observed(route: RouteDefinition) -> Self {
        if route.is_deleting() {
            SyncEvent::Delete {
                identity: route.identity(),
                route: Some(route),
            }
        } else {
            SyncEvent::Upsert(route)
        }
    }
}

pub struct SyncEngine<C> {
    client: Arc<C>,
    config: SyncConfig,
    metrics: Arc<SyncMetrics>,
}

impl<C: ClusterClient> SyncEngine<C> {
    pub fn new(client: Arc<C>, config: SyncConfig, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            client,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn reconcile(&self, event: &SyncEvent, cancel: &CancellationToken) -> Result<SyncOutcome> {
        match event {
            SyncEvent::Upsert(route) => self.upsert(route, cancel).await,
            SyncEvent::Delete { identity, route } => {
                self.teardown(identity, route.as_ref(), cancel).await
            }
        }
    }

    /// Advance the projection of a created or updated route
    pub async fn upsert(&self, route: &RouteDefinition, cancel: &CancellationToken) -> Result<SyncOutcome> {
        let started = Instant::now();
        let result = self.upsert_pass(route, cancel).await;
        self.metrics.observe(SyncPath::Upsert, &result, started.elapsed());
        result
    }

    /// Advance the removal of a deleted route's projection and finalizer
    ///
    /// A missing store does not end the teardown: the finalizer is still cleared.
    pub async fn teardown(
        &self,
        identity: &ResourceIdentity,
        route: Option<&RouteDefinition>,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let started = Instant::now();
        let result = self.teardown_pass(identity, route, cancel).await;
        self.metrics.observe(SyncPath::Teardown, &result, started.elapsed());
        result
    }

    fn store(&self) -> Result<ProjectionStore<'_, C>> {
        self.config.validate()?;
        Ok(ProjectionStore::new(
            self.client.as_ref(),
            &self.config.namespace,
            &self.config.secret_name,
        ))
    }

    async fn upsert_pass(&self, route: &RouteDefinition, cancel: &CancellationToken) -> Result<SyncOutcome> {
        let (namespace, name) = (route.namespace(), route.name());

        if !scope::is_managed(route.annotations(), &self.config.ingress_class) {
            debug!(namespace, name, "Ingress is not managed by this controller");
            return Ok(SyncOutcome::Done);
        }

        let store = self.store()?;
        let mut secret = match store.get_or_create(cancel).await {
            Ok(StoreLookup::Existing(secret)) => secret,
            Ok(StoreLookup::Created) => {
                info!(namespace, name, "Projection store did not exist and was created");
                return Ok(SyncOutcome::Requeue);
            }
            Err(CoreError::StoreCreateRace { .. }) => {
                info!(namespace, name, "Projection store was created elsewhere, retrying");
                return Ok(SyncOutcome::Requeue);
            }
            Err(e) => return Err(e),
        };

        // One backend write per pass; entries already current are skipped.
        for service in dependencies::resolve(self.client.as_ref(), route, cancel).await? {
            let key = keys::key_for_object(&service);
            match store.put_entry(&mut secret, &key, encode(&service)?, cancel).await? {
                WriteOutcome::Unchanged => continue,
                WriteOutcome::Written => {
                    self.metrics.record_write("Service");
                    info!(namespace, name, key = %key, "Stored backend service");
                    return Ok(SyncOutcome::Requeue);
                }
                WriteOutcome::Conflict => return Ok(SyncOutcome::Requeue),
            }
        }

        match finalizer::ensure_finalizer(self.client.as_ref(), route, INGRESS_FINALIZER, cancel).await? {
            WriteOutcome::Unchanged => {}
            WriteOutcome::Written | WriteOutcome::Conflict => return Ok(SyncOutcome::Requeue),
        }

        let key = keys::key_for(&route.kind(), namespace, name);
        match store.put_entry(&mut secret, &key, encode(route)?, cancel).await? {
            WriteOutcome::Written => {
                self.metrics.record_write(&route.kind());
                info!(namespace, name, key = %key, store = %self.config.secret_name, "Projection updated");
                Ok(SyncOutcome::Done)
            }
            WriteOutcome::Unchanged => {
                debug!(namespace, name, key = %key, "Projection already current");
                Ok(SyncOutcome::Done)
            }
            WriteOutcome::Conflict => Ok(SyncOutcome::Requeue),
        }
    }

    async fn teardown_pass(
        &self,
        identity: &ResourceIdentity,
        route: Option<&RouteDefinition>,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let (namespace, name) = (identity.namespace.as_str(), identity.name.as_str());
        let store = self.store()?;
        let key = keys::key_for(&identity.kind, namespace, name);

        match store.find(cancel).await? {
            Some(mut secret) => match store.remove_entry(&mut secret, &key, cancel).await? {
                WriteOutcome::Written => {
                    self.metrics.record_write(&identity.kind);
                    info!(namespace, name, key = %key, "Removed ingress from projection");
                    return Ok(SyncOutcome::Requeue);
                }
                WriteOutcome::Conflict => return Ok(SyncOutcome::Requeue),
                WriteOutcome::Unchanged => {}
            },
            None => debug!(namespace, name, "Projection store does not exist, nothing to remove"),
        }

        let Some(route) = route else {
            return Ok(SyncOutcome::Done);
        };
        match finalizer::clear_finalizer(self.client.as_ref(), route, INGRESS_FINALIZER, cancel).await? {
            WriteOutcome::Unchanged => {
                debug!(namespace, name, "Ingress fully torn down");
                Ok(SyncOutcome::Done)
            }
            WriteOutcome::Written | WriteOutcome::Conflict => Ok(SyncOutcome::Requeue),
        }
    }
}

/// Serialize an object for the projection store
pub fn encode<T: Serialize>(object: &T) -> Result<Vec<u8>> {
    Ok(serde_yaml::to_string(object)?.into_bytes())
}
