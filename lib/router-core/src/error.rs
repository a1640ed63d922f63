use crate::client::ApiError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Missing required configuration: {0}")]
    MissingConfiguration(&'static str),

    #[error("Projection store {namespace}/{name} was created concurrently")]
    StoreCreateRace { namespace: String, name: String },

    #[error("Service {namespace}/{name} for {route} could not be retrieved: {source}")]
    DependencyUnavailable {
        route: String,
        namespace: String,
        name: String,
        #[source]
        source: ApiError,
    },

    #[error("Unsupported resource shape: {0}")]
    UnsupportedShape(String),

    #[error("Kubernetes error: {0}")]
    Api(#[from] ApiError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Whether retrying the same input can succeed without a code or config change
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            CoreError::MissingConfiguration(_)
                | CoreError::UnsupportedShape(_)
                | CoreError::Serialization(_)
                | CoreError::Metrics(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(!CoreError::MissingConfiguration("ROUTER_CONTROLLER_NAMESPACE").is_retryable());
        assert!(!CoreError::UnsupportedShape("resource backend".to_string()).is_retryable());
        assert!(CoreError::Cancelled.is_retryable());
        assert!(CoreError::Api(ApiError::Other("connection reset".to_string())).is_retryable());
        assert!(CoreError::DependencyUnavailable {
            route: "Ingress shop/web".to_string(),
            namespace: "shop".to_string(),
            name: "cart".to_string(),
            source: ApiError::NotFound("services \"cart\" not found".to_string()),
        }
        .is_retryable());
    }

    #[test]
    fn test_dependency_error_message_names_service_and_route() {
        let err = CoreError::DependencyUnavailable {
            route: "Ingress shop/web".to_string(),
            namespace: "shop".to_string(),
            name: "cart".to_string(),
            source: ApiError::NotFound("services \"cart\" not found".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Service shop/cart for Ingress shop/web could not be retrieved: Not found: services \"cart\" not found"
        );
    }
}
