//! Projection store accessor
//!
//! The projection store is a single Secret whose data maps projection keys
//! to serialized objects. Every change replaces the whole Secret under its
//! current resourceVersion, so concurrent writers lose with a conflict
//! rather than clobbering each other.

use crate::client::{cancellable, ApiError, ClusterClient};
use crate::{CoreError, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use router_api::{MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of looking up the store on the upsert path
#[derive(Debug)]
pub enum StoreLookup {
    /// The store already existed
    Existing(Secret),
    /// The store was just created empty; the caller should retry before writing
    Created,
}

/// Result of a single write attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The change was persisted
    Written,
    /// Nothing to change, no call was made
    Unchanged,
    /// The object changed since it was read; re-read and retry
    Conflict,
}

pub struct ProjectionStore<'a, C> {
    client: &'a C,
    namespace: &'a str,
    name: &'a str,
}

impl<'a, C: ClusterClient> ProjectionStore<'a, C> {
    pub fn new(client: &'a C, namespace: &'a str, name: &'a str) -> Self {
        Self {
            client,
            namespace,
            name,
        }
    }

    /// Fetch the store, creating it empty when absent
    ///
    /// Losing a creation race reports [`CoreError::StoreCreateRace`].
    pub async fn get_or_create(&self, cancel: &CancellationToken) -> Result<StoreLookup> {
        match cancellable(cancel, self.client.get::<Secret>(self.namespace, self.name)).await {
            Ok(secret) => return Ok(StoreLookup::Existing(secret)),
            Err(CoreError::Api(ApiError::NotFound(_))) => {}
            Err(e) => return Err(e),
        }

        match cancellable(cancel, self.client.create(&self.empty_secret())).await {
            Ok(_) => {
                info!(
                    namespace = self.namespace,
                    store = self.name,
                    "Created projection store"
                );
                Ok(StoreLookup::Created)
            }
            Err(CoreError::Api(ApiError::AlreadyExists(_))) => Err(CoreError::StoreCreateRace {
                namespace: self.namespace.to_string(),
                name: self.name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Fetch the store if it exists
    pub async fn find(&self, cancel: &CancellationToken) -> Result<Option<Secret>> {
        match cancellable(cancel, self.client.get::<Secret>(self.namespace, self.name)).await {
            Ok(secret) => Ok(Some(secret)),
            Err(CoreError::Api(ApiError::NotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set `key` to `value` and persist, skipping the call if it already holds `value`
    ///
    /// On success `secret` is replaced by the persisted copy.
    pub async fn put_entry(
        &self,
        secret: &mut Secret,
        key: &str,
        value: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        if entry(secret, key) == Some(value.as_slice()) {
            return Ok(WriteOutcome::Unchanged);
        }

        let mut updated = secret.clone();
        updated
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), ByteString(value));
        self.persist(secret, updated, key, cancel).await
    }

    /// Delete `key` and persist, skipping the call if it is absent
    pub async fn remove_entry(
        &self,
        secret: &mut Secret,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        if entry(secret, key).is_none() {
            return Ok(WriteOutcome::Unchanged);
        }

        let mut updated = secret.clone();
        if let Some(data) = updated.data.as_mut() {
            data.remove(key);
        }
        self.persist(secret, updated, key, cancel).await
    }

    async fn persist(
        &self,
        secret: &mut Secret,
        updated: Secret,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        match cancellable(cancel, self.client.update(&updated)).await {
            Ok(persisted) => {
                *secret = persisted;
                Ok(WriteOutcome::Written)
            }
            Err(CoreError::Api(ApiError::Conflict(message))) => {
                debug!(
                    namespace = self.namespace,
                    store = self.name,
                    key,
                    %message,
                    "Projection store changed since it was read"
                );
                Ok(WriteOutcome::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    fn empty_secret(&self) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(self.name.to_string()),
                namespace: Some(self.namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_string(),
                    MANAGED_BY_VALUE.to_string(),
                )])),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(BTreeMap::new()),
            ..Default::default()
        }
    }
}

/// Bytes stored under `key`, if any
pub fn entry<'s>(secret: &'s Secret, key: &str) -> Option<&'s [u8]> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| value.0.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCluster, Verb};

    const NAMESPACE: &str = "router-system";
    const NAME: &str = "router-config";

    #[tokio::test]
    async fn test_get_or_create_creates_once() {
        let cluster = FakeCluster::new();
        let store = ProjectionStore::new(&cluster, NAMESPACE, NAME);
        let cancel = CancellationToken::new();

        assert!(matches!(
            store.get_or_create(&cancel).await.expect("create succeeds"),
            StoreLookup::Created
        ));
        let secret = match store.get_or_create(&cancel).await.expect("get succeeds") {
            StoreLookup::Existing(secret) => secret,
            StoreLookup::Created => panic!("store should already exist"),
        };
        assert_eq!(secret.data.map(|d| d.len()), Some(0));
        assert_eq!(
            secret.metadata.labels.unwrap().get(MANAGED_BY_LABEL).map(String::as_str),
            Some(MANAGED_BY_VALUE)
        );
    }

    #[tokio::test]
    async fn test_create_race_is_reported_distinctly() {
        let cluster = FakeCluster::new();
        cluster.fail_next(Verb::Create, "Secret", ApiError::AlreadyExists(NAME.to_string()));
        let store = ProjectionStore::new(&cluster, NAMESPACE, NAME);

        let err = store.get_or_create(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::StoreCreateRace { .. }));
    }

    #[tokio::test]
    async fn test_find_missing_store() {
        let cluster = FakeCluster::new();
        let store = ProjectionStore::new(&cluster, NAMESPACE, NAME);
        assert!(store.find(&CancellationToken::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_entry_skips_identical_value() {
        let cluster = FakeCluster::new();
        let store = ProjectionStore::new(&cluster, NAMESPACE, NAME);
        let cancel = CancellationToken::new();
        store.get_or_create(&cancel).await.unwrap();
        let mut secret = store.find(&cancel).await.unwrap().unwrap();

        let outcome = store
            .put_entry(&mut secret, "service.shop.cart", b"a".to_vec(), &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(entry(&secret, "service.shop.cart"), Some(&b"a"[..]));

        let writes = cluster.writes();
        let outcome = store
            .put_entry(&mut secret, "service.shop.cart", b"a".to_vec(), &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert_eq!(cluster.writes(), writes);
    }

    #[tokio::test]
    async fn test_concurrent_writers_conflict_then_both_land() {
        let cluster = FakeCluster::new();
        let store = ProjectionStore::new(&cluster, NAMESPACE, NAME);
        let cancel = CancellationToken::new();
        store.get_or_create(&cancel).await.unwrap();

        let mut first = store.find(&cancel).await.unwrap().unwrap();
        let mut second = first.clone();

        let outcome = store
            .put_entry(&mut first, "ingress.shop.web", b"web".to_vec(), &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written);

        let outcome = store
            .put_entry(&mut second, "ingress.shop.api", b"api".to_vec(), &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict);

        let mut fresh = store.find(&cancel).await.unwrap().unwrap();
        let outcome = store
            .put_entry(&mut fresh, "ingress.shop.api", b"api".to_vec(), &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written);

        let persisted = store.find(&cancel).await.unwrap().unwrap();
        assert_eq!(entry(&persisted, "ingress.shop.web"), Some(&b"web"[..]));
        assert_eq!(entry(&persisted, "ingress.shop.api"), Some(&b"api"[..]));
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let cluster = FakeCluster::new();
        let store = ProjectionStore::new(&cluster, NAMESPACE, NAME);
        let cancel = CancellationToken::new();
        store.get_or_create(&cancel).await.unwrap();
        let mut secret = store.find(&cancel).await.unwrap().unwrap();
        store
            .put_entry(&mut secret, "ingress.shop.web", b"web".to_vec(), &cancel)
            .await
            .unwrap();

        let outcome = store.remove_entry(&mut secret, "ingress.shop.web", &cancel).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert!(entry(&secret, "ingress.shop.web").is_none());

        let outcome = store.remove_entry(&mut secret, "ingress.shop.web", &cancel).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
    }
}
