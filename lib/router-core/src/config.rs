//! Sync engine configuration

use crate::{CoreError, Result};
use router_api::{DEFAULT_CONFIG_SECRET_NAME, DEFAULT_INGRESS_CLASS};

/// Namespace hosting the projection store
pub const CONTROLLER_NAMESPACE_ENV: &str = "ROUTER_CONTROLLER_NAMESPACE";
/// Name of the projection store Secret
pub const CONFIG_SECRET_ENV: &str = "ROUTER_CONFIG_SECRET";
/// Ingress class accepted as managed
pub const INGRESS_CLASS_ENV: &str = "ROUTER_INGRESS_CLASS";

/// Settings passed to the sync engine when it is built
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Namespace of the projection store Secret
    pub namespace: String,
    /// Name of the projection store Secret
    pub secret_name: String,
    /// Value of the ingress class annotation that marks an Ingress as managed
    pub ingress_class: String,
}

impl SyncConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            secret_name: DEFAULT_CONFIG_SECRET_NAME.to_string(),
            ingress_class: DEFAULT_INGRESS_CLASS.to_string(),
        }
    }

    pub fn with_secret_name(mut self, secret_name: impl Into<String>) -> Self {
        self.secret_name = secret_name.into();
        self
    }

    pub fn with_ingress_class(mut self, ingress_class: impl Into<String>) -> Self {
        self.ingress_class = ingress_class.into();
        self
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let namespace =
            read(CONTROLLER_NAMESPACE_ENV).ok_or(CoreError::MissingConfiguration(CONTROLLER_NAMESPACE_ENV))?;

        let mut config = Self::new(namespace);
        if let Some(secret_name) = read(CONFIG_SECRET_ENV) {
            config.secret_name = secret_name;
        }
        if let Some(ingress_class) = read(INGRESS_CLASS_ENV) {
            config.ingress_class = ingress_class;
        }
        Ok(config)
    }

    /// Check the values the engine cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(CoreError::MissingConfiguration(CONTROLLER_NAMESPACE_ENV));
        }
        if self.secret_name.trim().is_empty() {
            return Err(CoreError::MissingConfiguration(CONFIG_SECRET_ENV));
        }
        Ok(())
    }
}
