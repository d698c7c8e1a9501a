//! Controller configuration read from the environment.

use crate::error::ControllerError;
use std::time::Duration;

/// Default hub namespace for cluster credential secrets.
pub const DEFAULT_CREDENTIAL_NAMESPACE: &str = "vela-system";

/// Runtime settings of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace whose records are watched (None = all namespaces)
    pub watch_namespace: Option<String>,
    /// Hub namespace where credential secrets are stored
    pub credential_namespace: String,
    /// Requeue delay after a failed registration
    pub registration_retry: Duration,
    /// Deadline for each register / detach call
    pub collaborator_timeout: Duration,
    /// Periodic resync of settled records
    pub resync_interval: Option<Duration>,
    /// Port of the probe and metrics server
    pub metrics_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            credential_namespace: DEFAULT_CREDENTIAL_NAMESPACE.to_string(),
            registration_retry: Duration::from_secs(30),
            collaborator_timeout: Duration::from_secs(30),
            resync_interval: None,
            metrics_port: 8080,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secs = |key: &str| -> Result<Option<Duration>, ControllerError> {
            match get(key) {
                None => Ok(None),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(0) | Err(_) => Err(ControllerError::InvalidConfig(format!(
                        "{key} must be a positive number of seconds, got {raw:?}"
                    ))),
                    Ok(n) => Ok(Some(Duration::from_secs(n))),
                },
            }
        };

        let metrics_port = match get("METRICS_PORT") {
            None => defaults.metrics_port,
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                ControllerError::InvalidConfig(format!("METRICS_PORT must be a port number, got {raw:?}"))
            })?,
        };

        Ok(Self {
            watch_namespace: get("WATCH_NAMESPACE"),
            credential_namespace: get("CREDENTIAL_NAMESPACE").unwrap_or(defaults.credential_namespace),
            registration_retry: secs("REGISTRATION_RETRY_SECS")?.unwrap_or(defaults.registration_retry),
            collaborator_timeout: secs("COLLABORATOR_TIMEOUT_SECS")?.unwrap_or(defaults.collaborator_timeout),
            resync_interval: secs("RESYNC_INTERVAL_SECS")?,
            metrics_port,
        })
    }
}
