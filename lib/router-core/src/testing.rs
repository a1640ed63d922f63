//! In-memory cluster for engine tests
//!
//! Objects are stored as JSON keyed by (kind, namespace, name). Every
//! successful write stamps a fresh resourceVersion and updates must carry
//! the current one, like the API server's optimistic concurrency. A
//! deleting object whose last finalizer is removed disappears.

use crate::client::{ApiError, ApiResult, ClusterClient, ClusterObject};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use router_api::v1beta1;
use router_api::{IngressV1beta1, DEFAULT_INGRESS_CLASS, INGRESS_CLASS_ANNOTATION};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Get,
    Create,
    Update,
}

type ObjectKey = (String, String, String);

#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<BTreeMap<ObjectKey, serde_json::Value>>,
    failures: Mutex<VecDeque<(Verb, String, ApiError)>>,
    revision: AtomicU64,
    writes: AtomicUsize,
}

fn key_of<K: ClusterObject>(namespace: &str, name: &str) -> ObjectKey {
    (K::kind(&()).into_owned(), namespace.to_string(), name.to_string())
}

fn location<K: ClusterObject>(object: &K) -> ObjectKey {
    let meta = object.meta();
    key_of::<K>(
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default(),
    )
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object as-is, bypassing version checks
    pub fn seed<K: ClusterObject>(&self, object: K) -> K {
        let key = location(&object);
        let (value, stamped) = self.stamp(object);
        self.objects.lock().unwrap().insert(key, value);
        stamped
    }

    pub fn object<K: ClusterObject>(&self, namespace: &str, name: &str) -> Option<K> {
        let value = self
            .objects
            .lock()
            .unwrap()
            .get(&key_of::<K>(namespace, name))
            .cloned()?;
        Some(serde_json::from_value(value).expect("stored object decodes"))
    }

    /// Number of successful creates and updates
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Fail the next `verb` call on `kind` with `error`
    pub fn fail_next(&self, verb: Verb, kind: &str, error: ApiError) {
        self.failures
            .lock()
            .unwrap()
            .push_back((verb, kind.to_string(), error));
    }

    fn injected<K: ClusterObject>(&self, verb: Verb) -> ApiResult<()> {
        let kind = K::kind(&());
        let mut failures = self.failures.lock().unwrap();
        match failures.iter().position(|(v, k, _)| *v == verb && *k == kind) {
            Some(index) => Err(failures.remove(index).map(|(_, _, e)| e).unwrap()),
            None => Ok(()),
        }
    }

    fn stamp<K: ClusterObject>(&self, mut object: K) -> (serde_json::Value, K) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        object.meta_mut().resource_version = Some(revision.to_string());
        let value = serde_json::to_value(&object).expect("object serializes");
        (value, object)
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get<K: ClusterObject>(&self, namespace: &str, name: &str) -> ApiResult<K> {
        self.injected::<K>(Verb::Get)?;
        self.object(namespace, name)
            .ok_or_else(|| ApiError::NotFound(format!("{} {}/{}", K::kind(&()), namespace, name)))
    }

    async fn create<K: ClusterObject>(&self, object: &K) -> ApiResult<K> {
        self.injected::<K>(Verb::Create)?;
        let key = location(object);
        let (value, stamped) = self.stamp(object.clone());

        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(ApiError::AlreadyExists(format!("{} {}/{}", key.0, key.1, key.2)));
        }
        objects.insert(key, value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stamped)
    }

    async fn update<K: ClusterObject>(&self, object: &K) -> ApiResult<K> {
        self.injected::<K>(Verb::Update)?;
        let key = location(object);

        let mut objects = self.objects.lock().unwrap();
        let current_version = objects
            .get(&key)
            .ok_or_else(|| ApiError::NotFound(format!("{} {}/{}", key.0, key.1, key.2)))?
            .pointer("/metadata/resourceVersion")
            .and_then(|v| v.as_str())
            .map(String::from);
        if object.meta().resource_version != current_version {
            return Err(ApiError::Conflict(format!(
                "{} {}/{} has been modified",
                key.0, key.1, key.2
            )));
        }

        let (value, stamped) = self.stamp(object.clone());
        let meta = stamped.meta();
        let released = meta.deletion_timestamp.is_some()
            && meta.finalizers.as_ref().map_or(true, |f| f.is_empty());
        if released {
            objects.remove(&key);
        } else {
            objects.insert(key, value);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stamped)
    }
}

fn meta(namespace: &str, name: &str, annotated: bool) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        annotations: annotated.then(|| {
            BTreeMap::from([(
                INGRESS_CLASS_ANNOTATION.to_string(),
                DEFAULT_INGRESS_CLASS.to_string(),
            )])
        }),
        ..Default::default()
    }
}

/// v1 Ingress of the default class with one path per backend
pub fn managed_ingress(namespace: &str, name: &str, backends: &[&str]) -> Ingress {
    let paths = backends
        .iter()
        .map(|backend| HTTPIngressPath {
            path: Some(format!("/{}", backend)),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                resource: None,
                service: Some(IngressServiceBackend {
                    name: backend.to_string(),
                    port: Some(ServiceBackendPort {
                        number: Some(80),
                        name: None,
                    }),
                }),
            },
        })
        .collect();

    Ingress {
        metadata: meta(namespace, name, true),
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(format!("{}.example.com", name)),
                http: Some(HTTPIngressRuleValue { paths }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// v1beta1 Ingress of the default class with one path per backend
pub fn legacy_ingress(namespace: &str, name: &str, backends: &[&str]) -> IngressV1beta1 {
    let paths = backends
        .iter()
        .map(|backend| v1beta1::HTTPIngressPath {
            path: Some(format!("/{}", backend)),
            path_type: Some("Prefix".to_string()),
            backend: v1beta1::IngressBackend {
                service_name: Some(backend.to_string()),
                service_port: Some(v1beta1::ServicePort::Number(80)),
                resource: None,
            },
        })
        .collect();

    let mut ingress = IngressV1beta1::new(
        name,
        v1beta1::IngressV1beta1Spec {
            rules: vec![v1beta1::IngressRule {
                host: Some(format!("{}.example.com", name)),
                http: Some(v1beta1::HTTPIngressRuleValue { paths }),
            }],
            ..Default::default()
        },
    );
    ingress.metadata = meta(namespace, name, true);
    ingress
}

pub fn service(namespace: &str, name: &str) -> Service {
    Service {
        metadata: meta(namespace, name, false),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: 80,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
