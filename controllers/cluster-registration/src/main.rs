//! Cluster Registration Controller
//!
//! Watches ClusterRegistration CRDs and joins the described remote clusters
//! to the hub:
//! - parses the kubeconfig-like connection descriptor
//! - registers the cluster as a discoverable credential secret
//! - detaches the cluster when the record is deleted

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod server;
mod store;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    // kube's rustls client needs a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Cluster Registration Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Credential namespace: {}", config.credential_namespace);
    info!("  Registration retry: {}s", config.registration_retry.as_secs());
    info!("  Collaborator timeout: {}s", config.collaborator_timeout.as_secs());
    match config.resync_interval {
        Some(interval) => info!("  Resync interval: {}s", interval.as_secs()),
        None => info!("  Resync interval: disabled"),
    }
    info!("  Metrics port: {}", config.metrics_port);

    metrics::register_metrics()
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to register metrics: {e}")))?;

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
