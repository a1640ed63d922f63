//! Route definitions watched by the router controller

use crate::IngressV1beta1;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// An Ingress in one of the two shapes the API server may serve
///
/// Serializes as the wrapped object, so the projected form of a route is
/// exactly the object read from the cluster.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RouteDefinition {
    /// networking.k8s.io/v1, structured `service` backend references
    V1(Ingress),
    /// networking.k8s.io/v1beta1, flat `serviceName` backend references
    V1beta1(IngressV1beta1),
}

impl RouteDefinition {
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            RouteDefinition::V1(ingress) => &ingress.metadata,
            RouteDefinition::V1beta1(ingress) => &ingress.metadata,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            RouteDefinition::V1(ingress) => &mut ingress.metadata,
            RouteDefinition::V1beta1(ingress) => &mut ingress.metadata,
        }
    }

    /// Kind shared by both shapes
    pub fn kind(&self) -> String {
        match self {
            RouteDefinition::V1(_) => Ingress::kind(&()).into_owned(),
            RouteDefinition::V1beta1(_) => IngressV1beta1::kind(&()).into_owned(),
        }
    }

    pub fn api_version(&self) -> String {
        match self {
            RouteDefinition::V1(_) => Ingress::api_version(&()).into_owned(),
            RouteDefinition::V1beta1(_) => IngressV1beta1::api_version(&()).into_owned(),
        }
    }

    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(self.kind(), self.namespace(), self.name())
    }

    pub fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.meta().annotations.as_ref()
    }

    pub fn finalizers(&self) -> &[String] {
        self.meta().finalizers.as_deref().unwrap_or_default()
    }

    /// Whether the API server has marked this object for deletion
    pub fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }
}

impl From<Ingress> for RouteDefinition {
    fn from(ingress: Ingress) -> Self {
        RouteDefinition::V1(ingress)
    }
}

impl From<IngressV1beta1> for RouteDefinition {
    fn from(ingress: IngressV1beta1) -> Self {
        RouteDefinition::V1beta1(ingress)
    }
}

/// (kind, namespace, name) of a cluster object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}
