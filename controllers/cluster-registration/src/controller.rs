//! Main controller implementation.
//!
//! Wires the Kubernetes-backed record store and cluster registry into the
//! reconciler and runs the watcher next to the probe and metrics server.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::server::{ServerState, start_server};
use crate::store::KubeRegistrationStore;
use crate::watcher::{Context, watch_registrations};
use crds::ClusterRegistration;
use kube::{Api, Client};
use multicluster_client::{Detacher, KubeClusterRegistry, KubeconfigLoader, Registrar};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for cluster registration.
#[derive(Debug)]
pub struct Controller {
    registration_watcher: JoinHandle<Result<(), ControllerError>>,
    server: JoinHandle<Result<(), anyhow::Error>>,
}

impl Controller {
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing cluster registration controller");

        let kube_client = Client::try_default().await?;

        let api: Api<ClusterRegistration> = match config.watch_namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let registry = Arc::new(KubeClusterRegistry::new(
            kube_client.clone(),
            config.credential_namespace.clone(),
        ));
        let registrar: Arc<dyn Registrar> = registry.clone();
        let detacher: Arc<dyn Detacher> = registry;
        let reconciler = Reconciler::new(
            Arc::new(KubeRegistrationStore::new(kube_client)),
            Arc::new(KubeconfigLoader),
            registrar,
            detacher,
        )
        .with_registration_retry(config.registration_retry)
        .with_collaborator_timeout(config.collaborator_timeout);

        let ctx = Arc::new(Context {
            reconciler: Arc::new(reconciler),
            resync_interval: config.resync_interval,
        });

        let server_state = Arc::new(ServerState::default());
        let server = {
            let state = Arc::clone(&server_state);
            let port = config.metrics_port;
            tokio::spawn(async move { start_server(port, state).await })
        };

        let registration_watcher = tokio::spawn(async move { watch_registrations(api, ctx).await });
        server_state.is_ready.store(true, Ordering::Relaxed);

        Ok(Self {
            registration_watcher,
            server,
        })
    }

    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Cluster registration controller running");

        // Both tasks run forever; whichever stops first ends the process
        tokio::select! {
            result = &mut self.registration_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("ClusterRegistration watcher panicked: {e}")))??;
            }
            result = &mut self.server => {
                result.map_err(|e| ControllerError::Watch(format!("HTTP server panicked: {e}")))?
                    .map_err(|e| ControllerError::Watch(format!("HTTP server error: {e}")))?;
            }
        }

        Ok(())
    }
}
