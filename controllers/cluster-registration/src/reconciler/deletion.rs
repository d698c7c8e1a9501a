//! Deletion path.
//!
//! Detaches the registered cluster and then releases the finalizer. No
//! status is written on a record that is being deleted.

use super::{ReconcileOutcome, Reconciler};
use crate::error::ControllerError;
use crate::metrics;
use crds::{CLUSTER_REGISTRATION_FINALIZER, ClusterRegistration};
use multicluster_client::CLUSTER_LOCAL_NAME;
use tracing::{debug, error, info};

impl Reconciler {
    pub(crate) async fn reconcile_deletion(
        &self,
        record: &ClusterRegistration,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let namespace = record.metadata.namespace.as_deref().unwrap_or_default();
        let name = record.metadata.name.as_deref().unwrap_or_default();

        if !record.has_finalizer() {
            debug!("ClusterRegistration {}/{} has no finalizer, nothing to clean up", namespace, name);
            return Ok(ReconcileOutcome::AwaitChange);
        }

        // The stored name and the current one differ when a rename was not
        // registered yet; the credential may exist under either
        let resolved = record.resolved_cluster_name();
        let mut names = Vec::with_capacity(2);
        if let Some(registered) = record.registered_cluster_name() {
            names.push(registered.to_string());
        }
        if !names.contains(&resolved) {
            names.push(resolved);
        }

        for cluster_name in &names {
            info!("Detaching cluster {} for ClusterRegistration {}/{}", cluster_name, namespace, name);
            if let Err(e) = self.detach_if_registered(cluster_name).await {
                error!("Failed to detach cluster {} for ClusterRegistration {}/{}: {}", cluster_name, namespace, name, e);
                return Err(e);
            }
        }

        let finalizers: Vec<String> = record
            .metadata
            .finalizers
            .iter()
            .flatten()
            .filter(|f| *f != CLUSTER_REGISTRATION_FINALIZER)
            .cloned()
            .collect();
        self.store.set_finalizers(record, finalizers).await?;
        info!("Removed finalizer from ClusterRegistration {}/{}", namespace, name);

        Ok(ReconcileOutcome::AwaitChange)
    }

    /// Detach `cluster_name`. An already missing credential counts as
    /// detached and the local cluster is never touched.
    pub(crate) async fn detach_if_registered(&self, cluster_name: &str) -> Result<(), ControllerError> {
        if cluster_name == CLUSTER_LOCAL_NAME {
            debug!("Cluster name {} is the local cluster, skipping detach", cluster_name);
            return Ok(());
        }
        match self.detach(cluster_name).await {
            Ok(()) => {
                metrics::increment_detachments();
                info!("Cluster {} detached", cluster_name);
                Ok(())
            }
            Err(ControllerError::Cluster(e)) if e.is_not_found() => {
                info!("Cluster {} already detached", cluster_name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
