use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ingress as served by networking.k8s.io/v1beta1
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "networking.k8s.io",
    version = "v1beta1",
    kind = "Ingress",
    plural = "ingresses",
    namespaced,
    status = "IngressV1beta1Status",
    derive = "Default",
    derive = "PartialEq",
)]
#[serde(rename_all = "camelCase")]
pub struct IngressV1beta1Spec {
    /// Backend for requests that match no rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<IngressBackend>,

    /// Ingress class name (superseded the class annotation in 1.18)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,

    /// Host rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IngressRule>,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTLS>,
}

/// Host rule mapping paths to backends
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IngressRule {
    /// Fully qualified host name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// HTTP paths for this host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HTTPIngressRuleValue>,
}

/// Collection of paths under one host
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HTTPIngressRuleValue {
    pub paths: Vec<HTTPIngressPath>,
}

/// Path routed to a backend
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HTTPIngressPath {
    /// Path matched against the request path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Exact, Prefix or ImplementationSpecific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_type: Option<String>,

    /// Backend receiving matched traffic
    pub backend: IngressBackend,
}

/// Backend of a v1beta1 path: a flat service name and port, or a typed resource
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackend {
    /// Name of the referenced Service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Port of the referenced Service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_port: Option<ServicePort>,

    /// Non-Service backend in the same namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<TypedObjectReference>,
}

/// Service port given by number or by name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ServicePort {
    Number(i32),
    Name(String),
}

/// Reference to an object of an arbitrary kind
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypedObjectReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    pub kind: String,
    pub name: String,
}

/// Observed state of a v1beta1 Ingress
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressV1beta1Status {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancerStatus>,
}

/// Addresses the load balancer publishes for an Ingress
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoadBalancerStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<LoadBalancerIngress>,
}

/// One load balancer ingress point, by IP or by hostname
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoadBalancerIngress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// TLS settings for a set of hosts
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressTLS {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    /// Secret holding the certificate and key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}
