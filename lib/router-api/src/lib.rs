//! Datum Router API types for route projection
//!
//! This library defines the Kubernetes resources the router controller
//! watches and writes:
//! - RouteDefinition: an Ingress in either of its served shapes
//! - IngressV1beta1: bindings for the legacy `networking.k8s.io/v1beta1` Ingress
//! - Well-known names shared between the controller and the config applier

pub mod v1beta1;
pub mod route;

pub use route::{ResourceIdentity, RouteDefinition};
pub use v1beta1::IngressV1beta1;

/// Finalizer placed on managed ingresses until their projection entry is removed
pub const INGRESS_FINALIZER: &str = "router.datum.net/ingress";

/// Annotation selecting the ingress controller responsible for an Ingress
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Ingress class handled by the router unless configured otherwise
pub const DEFAULT_INGRESS_CLASS: &str = "edge-router";

/// Name of the Secret holding the projected configuration
pub const DEFAULT_CONFIG_SECRET_NAME: &str = "router-config";

/// Label marking objects created by the router controller
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`] on objects created by the router controller
pub const MANAGED_BY_VALUE: &str = "router-controller";
