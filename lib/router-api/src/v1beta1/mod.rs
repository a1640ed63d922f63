/// Bindings for the legacy networking.k8s.io/v1beta1 API
///
/// Clusters older than 1.22 still serve Ingress at v1beta1, where a path
/// backend names its Service with a flat `serviceName` string instead of
/// the structured `service` reference used by v1.

pub mod ingress;

pub use ingress::Ingress as IngressV1beta1;
pub use ingress::{
    HTTPIngressPath, HTTPIngressRuleValue, IngressBackend, IngressRule, IngressTLS,
    IngressV1beta1Spec, IngressV1beta1Status, LoadBalancerIngress, LoadBalancerStatus,
    ServicePort, TypedObjectReference,
};
