//! Cluster API seam used by the sync engine
//!
//! The engine only ever gets, creates and replaces whole namespaced
//! objects. Replacement carries `metadata.resourceVersion`, so a stale
//! write fails with [`ApiError::Conflict`] instead of overwriting.

use crate::{CoreError, Result};
use async_trait::async_trait;
use kube::api::PostParams;
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Typed failure conditions of a cluster API call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API request failed: {0}")]
    Other(String),
}

impl From<kube::Error> for ApiError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(response) if response.code == 404 => {
                ApiError::NotFound(response.message.clone())
            }
            kube::Error::Api(response)
                if response.code == 409 && response.reason == "AlreadyExists" =>
            {
                ApiError::AlreadyExists(response.message.clone())
            }
            kube::Error::Api(response) if response.code == 409 => {
                ApiError::Conflict(response.message.clone())
            }
            _ => ApiError::Other(err.to_string()),
        }
    }
}

/// Namespaced object the engine can read and write
pub trait ClusterObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ClusterObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Round trips against the cluster API
#[async_trait]
pub trait ClusterClient: Send + Sync + 'static {
    async fn get<K: ClusterObject>(&self, namespace: &str, name: &str) -> ApiResult<K>;

    async fn create<K: ClusterObject>(&self, object: &K) -> ApiResult<K>;

    /// Replace the whole object, failing with a conflict if it changed since it was read
    async fn update<K: ClusterObject>(&self, object: &K) -> ApiResult<K>;
}

/// [`ClusterClient`] backed by a kube [`Client`]
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: ClusterObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn object_location<K: ClusterObject>(object: &K) -> ApiResult<(&str, &str)> {
    let meta = object.meta();
    match (meta.namespace.as_deref(), meta.name.as_deref()) {
        (Some(namespace), Some(name)) => Ok((namespace, name)),
        _ => Err(ApiError::Other(format!(
            "{} is missing a namespace or name",
            K::kind(&())
        ))),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get<K: ClusterObject>(&self, namespace: &str, name: &str) -> ApiResult<K> {
        Ok(self.api::<K>(namespace).get(name).await?)
    }

    async fn create<K: ClusterObject>(&self, object: &K) -> ApiResult<K> {
        let (namespace, _) = object_location(object)?;
        Ok(self
            .api::<K>(namespace)
            .create(&PostParams::default(), object)
            .await?)
    }

    async fn update<K: ClusterObject>(&self, object: &K) -> ApiResult<K> {
        let (namespace, name) = object_location(object)?;
        Ok(self
            .api::<K>(namespace)
            .replace(name, &PostParams::default(), object)
            .await?)
    }
}

/// Run a cluster call, abandoning it as soon as `cancel` fires
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = ApiResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CoreError::Cancelled),
        result = call => result.map_err(CoreError::from),
    }
}
