//! Ingress controller driving the sync engine
//!
//! A single controller watches the preferred served Ingress shape. Each
//! reconcile turns the observed object into a sync event and maps the
//! engine's outcome to a controller action.

use crate::settings::ControllerSettings;
use futures::StreamExt;
use kube::{Api, Resource};
use kube_runtime::{controller::Action, watcher, Controller};
use router_api::RouteDefinition;
use router_core::{CoreError, KubeClusterClient, SyncEngine, SyncEvent, SyncOutcome};
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Failed non-retryable passes wait this many error intervals
const NON_RETRYABLE_BACKOFF_FACTOR: u32 = 5;

#[derive(Debug)]
pub struct ReconcileError(pub CoreError);

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reconciliation error: {}", self.0)
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl From<CoreError> for ReconcileError {
    fn from(e: CoreError) -> Self {
        ReconcileError(e)
    }
}

/// Ingress API versions the controller can watch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngressShape {
    V1,
    V1beta1,
}

/// Pick the single shape to watch
///
/// Both shapes are views of the same objects, so watching both would have
/// two controllers writing one projection entry. v1beta1 is only used when
/// v1 is not served.
pub fn preferred_shape(v1_served: bool, v1beta1_served: bool) -> Option<IngressShape> {
    match (v1_served, v1beta1_served) {
        (true, _) => Some(IngressShape::V1),
        (false, true) => Some(IngressShape::V1beta1),
        (false, false) => None,
    }
}

pub struct Context {
    pub engine: SyncEngine<KubeClusterClient>,
    pub settings: ControllerSettings,
    pub cancel: CancellationToken,
}

pub struct IngressController<K> {
    api: Api<K>,
    ctx: Arc<Context>,
}

impl<K> IngressController<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
    K: Into<RouteDefinition>,
{
    pub fn new(api: Api<K>, ctx: Arc<Context>) -> Self {
        Self { api, ctx }
    }

    pub async fn run(self) {
        let kind = K::kind(&()).into_owned();
        let version = K::version(&()).into_owned();
        info!(kind = %kind, version = %version, "Starting Ingress reconciliation");

        let cancel = self.ctx.cancel.clone();
        Controller::new(self.api, watcher::Config::default())
            .graceful_shutdown_on(async move { cancel.cancelled().await })
            .run(reconcile::<K>, error_policy::<K>, self.ctx)
            .for_each(|item| async move {
                match item {
                    Ok((object, _)) => debug!(
                        namespace = object.namespace.as_deref().unwrap_or_default(),
                        name = %object.name,
                        "Reconciled Ingress"
                    ),
                    Err(e) => warn!("Error in reconciliation stream: {}", e),
                }
            })
            .await;

        info!(kind = %kind, version = %version, "Ingress reconciliation stopped");
    }
}

async fn reconcile<K>(object: Arc<K>, ctx: Arc<Context>) -> Result<Action, ReconcileError>
where
    K: Clone + Into<RouteDefinition>,
{
    let route: RouteDefinition = object.as_ref().clone().into();
    debug!(
        namespace = route.namespace(),
        name = route.name(),
        version = %route.api_version(),
        "Reconciling Ingress"
    );

    let event = SyncEvent::observed(route);
    match ctx.engine.reconcile(&event, &ctx.cancel).await? {
        SyncOutcome::Done => Ok(Action::await_change()),
        SyncOutcome::Requeue => Ok(Action::requeue(ctx.settings.requeue_interval)),
    }
}

fn error_policy<K>(object: Arc<K>, error: &ReconcileError, ctx: Arc<Context>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let meta = object.meta();
    let namespace = meta.namespace.as_deref().unwrap_or_default();
    let name = meta.name.as_deref().unwrap_or_default();

    if let CoreError::Cancelled = error.0 {
        debug!(namespace, name, "Reconciliation cancelled");
        return Action::await_change();
    }

    let delay = if error.0.is_retryable() {
        ctx.settings.error_requeue_interval
    } else {
        ctx.settings.error_requeue_interval * NON_RETRYABLE_BACKOFF_FACTOR
    };
    error!(namespace, name, retry_in = ?delay, "{}", error);
    Action::requeue(delay)
}
