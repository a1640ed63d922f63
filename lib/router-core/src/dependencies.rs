//! Resolves the Services an Ingress routes to

use crate::client::{cancellable, ClusterClient};
use crate::{CoreError, Result};
use k8s_openapi::api::core::v1::Service;
use router_api::RouteDefinition;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Namespace-scoped name of a backend Service
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendReference {
    pub namespace: String,
    pub name: String,
}

/// Backend Services referenced by the route's paths, in rule order then path order
///
/// Both Ingress shapes normalize to the same references. Duplicates keep
/// their first position.
pub fn backend_references(route: &RouteDefinition) -> Result<Vec<BackendReference>> {
    let namespace = route.namespace();
    let mut names: Vec<String> = Vec::new();

    match route {
        RouteDefinition::V1(ingress) => {
            let rules = ingress
                .spec
                .as_ref()
                .and_then(|spec| spec.rules.as_deref())
                .unwrap_or_default();
            for rule in rules {
                let Some(http) = &rule.http else { continue };
                for path in &http.paths {
                    match &path.backend.service {
                        Some(service) => names.push(service.name.clone()),
                        None => {
                            return Err(unsupported_backend(route, path.path.as_deref()));
                        }
                    }
                }
            }
        }
        RouteDefinition::V1beta1(ingress) => {
            for rule in &ingress.spec.rules {
                let Some(http) = &rule.http else { continue };
                for path in &http.paths {
                    match &path.backend.service_name {
                        Some(name) => names.push(name.clone()),
                        None => {
                            return Err(unsupported_backend(route, path.path.as_deref()));
                        }
                    }
                }
            }
        }
    }

    let mut references: Vec<BackendReference> = Vec::with_capacity(names.len());
    for name in names {
        let reference = BackendReference {
            namespace: namespace.to_string(),
            name,
        };
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    Ok(references)
}

fn unsupported_backend(route: &RouteDefinition, path: Option<&str>) -> CoreError {
    CoreError::UnsupportedShape(format!(
        "{} path {} has a backend that is not a Service",
        route.identity(),
        path.unwrap_or("/")
    ))
}

/// Fetch every backend Service of the route, one at a time
///
/// Any failed lookup fails the whole resolution.
pub async fn resolve<C: ClusterClient>(
    client: &C,
    route: &RouteDefinition,
    cancel: &CancellationToken,
) -> Result<Vec<Service>> {
    let references = backend_references(route)?;
    let mut services = Vec::with_capacity(references.len());

    for reference in references {
        let service = cancellable(cancel, client.get::<Service>(&reference.namespace, &reference.name))
            .await
            .map_err(|err| match err {
                CoreError::Api(source) => CoreError::DependencyUnavailable {
                    route: route.identity().to_string(),
                    namespace: reference.namespace.clone(),
                    name: reference.name.clone(),
                    source,
                },
                other => other,
            })?;
        debug!(
            namespace = %reference.namespace,
            name = %reference.name,
            "Resolved backend service"
        );
        services.push(service);
    }

    Ok(services)
}
