//! Record store
//!
//! Reads and writes ClusterRegistration records. The reconciler only goes
//! through [`RegistrationStore`] so that it can run against an in-memory
//! store in tests.
//!
//! Writes are merge patches that carry the record's `resourceVersion`, so a
//! concurrent update surfaces as a 409 conflict instead of being overwritten.

use crate::error::ControllerError;
use crds::{ClusterRegistration, ClusterRegistrationStatus};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};

/// Access to ClusterRegistration records.
#[async_trait::async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Fetch a record, `None` if it no longer exists.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ClusterRegistration>, ControllerError>;

    /// Replace the record's finalizer list.
    async fn set_finalizers(&self, record: &ClusterRegistration, finalizers: Vec<String>) -> Result<(), ControllerError>;

    /// Replace the record's status sub-resource.
    async fn update_status(&self, record: &ClusterRegistration, status: &ClusterRegistrationStatus) -> Result<(), ControllerError>;
}

/// Store backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeRegistrationStore {
    client: Client,
}

impl std::fmt::Debug for KubeRegistrationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeRegistrationStore").finish_non_exhaustive()
    }
}

impl KubeRegistrationStore {
    /// Creates a new store.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ClusterRegistration> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn conflict_or_kube(error: kube::Error) -> ControllerError {
    match error {
        kube::Error::Api(ae) if ae.code == 409 => ControllerError::Conflict(ae.message),
        other => ControllerError::Kube(other),
    }
}

fn key(record: &ClusterRegistration) -> (String, String) {
    (
        record.metadata.namespace.clone().unwrap_or_default(),
        record.metadata.name.clone().unwrap_or_default(),
    )
}

/// Status patch with explicit nulls, so fields that were cleared are
/// removed by the merge instead of being left behind.
pub(crate) fn status_patch(
    record: &ClusterRegistration,
    status: &ClusterRegistrationStatus,
) -> Result<serde_json::Value, ControllerError> {
    let mut value = serde_json::to_value(status)?;
    if let Some(fields) = value.as_object_mut() {
        for field in ["conditions", "clusterInfo", "registeredClusterName", "message", "lastReconcileTime"] {
            fields.entry(field).or_insert(serde_json::Value::Null);
        }
    }
    Ok(serde_json::json!({
        "metadata": { "resourceVersion": record.metadata.resource_version },
        "status": value,
    }))
}

#[async_trait::async_trait]
impl RegistrationStore for KubeRegistrationStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ClusterRegistration>, ControllerError> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn set_finalizers(&self, record: &ClusterRegistration, finalizers: Vec<String>) -> Result<(), ControllerError> {
        let (namespace, name) = key(record);
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": record.metadata.resource_version,
                "finalizers": finalizers,
            }
        });
        self.api(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(conflict_or_kube)?;
        Ok(())
    }

    async fn update_status(&self, record: &ClusterRegistration, status: &ClusterRegistrationStatus) -> Result<(), ControllerError> {
        let (namespace, name) = key(record);
        let patch = status_patch(record, status)?;
        self.api(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(conflict_or_kube)?;
        Ok(())
    }
}
