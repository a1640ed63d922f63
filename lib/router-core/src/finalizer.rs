//! Finalizer management for managed route definitions

use crate::client::{cancellable, ApiError, ClusterClient};
use crate::store::WriteOutcome;
use crate::{CoreError, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use router_api::RouteDefinition;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub fn has_finalizer(meta: &ObjectMeta, marker: &str) -> bool {
    meta.finalizers
        .as_ref()
        .map(|finalizers| finalizers.iter().any(|f| f == marker))
        .unwrap_or(false)
}

/// Append `marker` unless present; returns whether the set changed
pub fn add_finalizer(meta: &mut ObjectMeta, marker: &str) -> bool {
    if has_finalizer(meta, marker) {
        return false;
    }
    meta.finalizers
        .get_or_insert_with(Vec::new)
        .push(marker.to_string());
    true
}

/// Drop every occurrence of `marker`, keeping the others in order; returns whether the set changed
pub fn remove_finalizer(meta: &mut ObjectMeta, marker: &str) -> bool {
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != marker);
    let changed = finalizers.len() != before;
    if finalizers.is_empty() {
        meta.finalizers = None;
    }
    changed
}

/// Add `marker` to the route and persist it
pub async fn ensure_finalizer<C: ClusterClient>(
    client: &C,
    route: &RouteDefinition,
    marker: &str,
    cancel: &CancellationToken,
) -> Result<WriteOutcome> {
    let mut updated = route.clone();
    if !add_finalizer(updated.meta_mut(), marker) {
        return Ok(WriteOutcome::Unchanged);
    }

    let outcome = persist(client, &updated, cancel).await?;
    if outcome == WriteOutcome::Written {
        info!(
            namespace = route.namespace(),
            name = route.name(),
            finalizer = marker,
            "Added finalizer to ingress"
        );
    }
    Ok(outcome)
}

/// Remove `marker` from the route and persist it
///
/// A route that no longer exists has nothing left to clear.
pub async fn clear_finalizer<C: ClusterClient>(
    client: &C,
    route: &RouteDefinition,
    marker: &str,
    cancel: &CancellationToken,
) -> Result<WriteOutcome> {
    let mut updated = route.clone();
    if !remove_finalizer(updated.meta_mut(), marker) {
        return Ok(WriteOutcome::Unchanged);
    }

    match persist(client, &updated, cancel).await {
        Ok(outcome) => {
            if outcome == WriteOutcome::Written {
                info!(
                    namespace = route.namespace(),
                    name = route.name(),
                    finalizer = marker,
                    "Removed finalizer from deleting ingress"
                );
            }
            Ok(outcome)
        }
        Err(CoreError::Api(ApiError::NotFound(_))) => {
            debug!(
                namespace = route.namespace(),
                name = route.name(),
                "Ingress already gone, no finalizer to remove"
            );
            Ok(WriteOutcome::Unchanged)
        }
        Err(e) => Err(e),
    }
}

async fn persist<C: ClusterClient>(
    client: &C,
    route: &RouteDefinition,
    cancel: &CancellationToken,
) -> Result<WriteOutcome> {
    let result = match route {
        RouteDefinition::V1(ingress) => cancellable(cancel, client.update(ingress)).await.map(|_| ()),
        RouteDefinition::V1beta1(ingress) => {
            cancellable(cancel, client.update(ingress)).await.map(|_| ())
        }
    };

    match result {
        Ok(()) => Ok(WriteOutcome::Written),
        Err(CoreError::Api(ApiError::Conflict(message))) => {
            debug!(
                namespace = route.namespace(),
                name = route.name(),
                %message,
                "Ingress changed since it was read, retrying"
            );
            Ok(WriteOutcome::Conflict)
        }
        Err(e) => Err(e),
    }
}
