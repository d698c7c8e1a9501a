//! Status projection.
//!
//! Builders for every status the reconciler writes. Each one replaces the
//! condition list with a single Ready condition, so the list never grows
//! past one entry.

use super::Reconciler;
use crate::error::ControllerError;
use crate::metrics;
use chrono::Utc;
use crds::{
    ClusterInfo, ClusterRegistration, ClusterRegistrationStatus, Condition, RegistrationPhase,
};
use multicluster_client::RegisteredCluster;
use tracing::{debug, error, warn};

fn current(record: &ClusterRegistration) -> ClusterRegistrationStatus {
    record.status.clone().unwrap_or_default()
}

fn previous_condition(record: &ClusterRegistration) -> Option<&Condition> {
    record.status.as_ref().and_then(|s| s.conditions.first())
}

/// Registration has started. Judgments from an earlier generation are
/// dropped; the registered name is kept so it can still be detached.
pub(crate) fn progressing(record: &ClusterRegistration, cluster_name: &str) -> ClusterRegistrationStatus {
    ClusterRegistrationStatus {
        phase: RegistrationPhase::Progressing,
        conditions: Vec::new(),
        cluster_info: None,
        message: Some(format!("Registering cluster {cluster_name}")),
        last_reconcile_time: Some(Utc::now()),
        ..current(record)
    }
}

/// Cluster registered.
pub(crate) fn ready(
    record: &ClusterRegistration,
    cluster_name: &str,
    registered: &RegisteredCluster,
) -> ClusterRegistrationStatus {
    let message = format!("Cluster {cluster_name} registered successfully");
    ClusterRegistrationStatus {
        phase: RegistrationPhase::Ready,
        conditions: vec![
            Condition::available(message.clone()).carry_transition_time(previous_condition(record)),
        ],
        cluster_info: Some(ClusterInfo {
            endpoint: registered.endpoint.clone(),
            credential_type: registered.credential_type.as_str().to_string(),
            version: registered.version.clone(),
        }),
        registered_cluster_name: Some(cluster_name.to_string()),
        message: Some(message),
        observed_generation: record.generation(),
        last_reconcile_time: Some(Utc::now()),
    }
}

/// Registration failed but will be retried. A record that was Ready for an
/// earlier generation goes back to Progressing and loses its cluster info.
pub(crate) fn retrying(record: &ClusterRegistration, message: &str) -> ClusterRegistrationStatus {
    ClusterRegistrationStatus {
        phase: RegistrationPhase::Progressing,
        conditions: vec![
            Condition::unavailable(message).carry_transition_time(previous_condition(record)),
        ],
        cluster_info: None,
        message: Some(message.to_string()),
        ..current(record)
    }
}

/// Permanent failure for the current generation.
pub(crate) fn failed(record: &ClusterRegistration, message: &str) -> ClusterRegistrationStatus {
    ClusterRegistrationStatus {
        phase: RegistrationPhase::Failed,
        conditions: vec![
            Condition::unavailable(message).carry_transition_time(previous_condition(record)),
        ],
        cluster_info: None,
        registered_cluster_name: current(record).registered_cluster_name,
        message: Some(message.to_string()),
        observed_generation: record.generation(),
        last_reconcile_time: Some(Utc::now()),
    }
}

/// True if `new` differs from what the record already shows.
///
/// `lastReconcileTime` is ignored: it changes on every pass.
pub(crate) fn status_needs_update(
    existing: Option<&ClusterRegistrationStatus>,
    new: &ClusterRegistrationStatus,
) -> bool {
    let Some(existing) = existing else {
        return true;
    };
    existing.phase != new.phase
        || existing.conditions != new.conditions
        || existing.cluster_info != new.cluster_info
        || existing.registered_cluster_name != new.registered_cluster_name
        || existing.message != new.message
        || existing.observed_generation != new.observed_generation
}

impl Reconciler {
    /// Write `status` unless the record already shows it. Errors propagate
    /// so the dispatcher redelivers the record.
    pub(crate) async fn write_status(
        &self,
        record: &ClusterRegistration,
        status: ClusterRegistrationStatus,
    ) -> Result<(), ControllerError> {
        if !status_needs_update(record.status.as_ref(), &status) {
            debug!(
                "Status of ClusterRegistration {}/{} unchanged, skipping update",
                record.metadata.namespace.as_deref().unwrap_or_default(),
                record.metadata.name.as_deref().unwrap_or_default()
            );
            return Ok(());
        }
        self.store.update_status(record, &status).await
    }

    /// Move the record to Failed. A failing write is only logged.
    pub(crate) async fn project_failure(&self, record: &ClusterRegistration, message: &str) {
        let namespace = record.metadata.namespace.as_deref().unwrap_or_default();
        let name = record.metadata.name.as_deref().unwrap_or_default();
        warn!("ClusterRegistration {}/{} failed: {}", namespace, name, message);
        metrics::increment_failed_projections();

        if let Err(e) = self.store.update_status(record, &failed(record, message)).await {
            error!(
                "Failed to record failure status for ClusterRegistration {}/{}: {}",
                namespace, name, e
            );
        }
    }
}
