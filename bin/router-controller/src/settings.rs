//! Controller process settings

use anyhow::{Context, Result};
use std::time::Duration;

pub const REQUEUE_SECS_ENV: &str = "ROUTER_REQUEUE_SECS";
pub const ERROR_REQUEUE_SECS_ENV: &str = "ROUTER_ERROR_REQUEUE_SECS";
pub const LOG_FORMAT_ENV: &str = "ROUTER_LOG_FORMAT";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Delay before the next pass when the engine asks to requeue
    pub requeue_interval: Duration,
    /// Delay before retrying a pass that failed
    pub error_requeue_interval: Duration,
    pub log_format: LogFormat,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            requeue_interval: Duration::from_secs(1),
            error_requeue_interval: Duration::from_secs(60),
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let seconds = |key: &str| -> Result<Option<Duration>> {
            read(key)
                .map(|value| {
                    value
                        .parse::<u64>()
                        .map(Duration::from_secs)
                        .with_context(|| format!("{} must be a whole number of seconds, got {:?}", key, value))
                })
                .transpose()
        };

        let mut settings = Self::default();
        if let Some(interval) = seconds(REQUEUE_SECS_ENV)? {
            settings.requeue_interval = interval;
        }
        if let Some(interval) = seconds(ERROR_REQUEUE_SECS_ENV)? {
            settings.error_requeue_interval = interval;
        }
        if read(LOG_FORMAT_ENV).is_some_and(|format| format.eq_ignore_ascii_case("json")) {
            settings.log_format = LogFormat::Json;
        }
        Ok(settings)
    }
}
