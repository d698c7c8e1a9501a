//! ClusterRegistration CRD
//!
//! Joins a remote cluster to the hub by supplying its kubeconfig-like
//! connection descriptor. The controller turns the record into a
//! discoverable cluster credential secret and removes it on deletion.

use crate::condition::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Finalizer that guards detachment of the registered cluster.
pub const CLUSTER_REGISTRATION_FINALIZER: &str = "clusterregistration.core.oam.dev/finalizer";

/// Namespace created in the remote cluster when the spec leaves it empty.
pub const DEFAULT_CREATE_NAMESPACE: &str = "vela-system";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "core.oam.dev",
    version = "v1beta1",
    kind = "ClusterRegistration",
    namespaced,
    status = "ClusterRegistrationStatus",
    shortname = "clusterreg",
    category = "oam",
    derive = "PartialEq",
    printcolumn = r#"{"name":"CLUSTER","type":"string","jsonPath":".spec.clusterName"}"#,
    printcolumn = r#"{"name":"PHASE","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"ENDPOINT","type":"string","jsonPath":".status.clusterInfo.endpoint"}"#,
    printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRegistrationSpec {
    /// Name the remote cluster is registered under (defaults to metadata.name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    /// Human-readable display name for the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Raw kubeconfig document for the cluster being joined
    #[serde(alias = "kubeconfig")]
    pub connection_descriptor: String,

    /// Namespace to create in the remote cluster (defaults to "vela-system")
    #[serde(default, alias = "createNamespace", skip_serializing_if = "Option::is_none")]
    pub namespace_to_create: Option<String>,

    /// Labels copied onto the cluster credential secret
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ClusterRegistration {
    /// Cluster name from the spec, falling back to the record name.
    ///
    /// An empty `clusterName` counts as unset.
    pub fn resolved_cluster_name(&self) -> String {
        match self.spec.cluster_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.metadata.name.clone().unwrap_or_default(),
        }
    }

    /// Namespace to create in the remote cluster, with the default applied.
    pub fn resolved_create_namespace(&self) -> String {
        match self.spec.namespace_to_create.as_deref() {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => DEFAULT_CREATE_NAMESPACE.to_string(),
        }
    }

    /// True once the API server has stamped a deletion timestamp.
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// True if the detachment finalizer is present.
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|f| f == CLUSTER_REGISTRATION_FINALIZER))
    }

    /// Current spec generation (0 when the server has not assigned one).
    pub fn generation(&self) -> i64 {
        self.metadata.generation.unwrap_or_default()
    }

    /// Current phase, `Pending` when no status has been written yet.
    pub fn phase(&self) -> RegistrationPhase {
        self.status
            .as_ref()
            .map(|s| s.phase.clone())
            .unwrap_or_default()
    }

    /// Cluster name the credential is currently stored under, if any.
    pub fn registered_cluster_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.registered_cluster_name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// True when the record is Ready for its current generation.
    pub fn is_settled(&self) -> bool {
        self.status.as_ref().is_some_and(|s| {
            s.phase == RegistrationPhase::Ready && s.observed_generation == self.generation()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRegistrationStatus {
    /// Registration phase
    #[serde(default)]
    pub phase: RegistrationPhase,

    /// Latest Ready condition; never holds more than one entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Registered cluster details, set once the cluster is Ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_info: Option<ClusterInfo>,

    /// Name the cluster credential was last stored under; detached when
    /// the cluster is renamed or the record is deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_cluster_name: Option<String>,

    /// Last human-readable outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Spec generation last reconciled to completion
    #[serde(default)]
    pub observed_generation: i64,

    /// Last reconciliation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Details of a registered cluster. Credentials never appear here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    /// API server endpoint
    #[serde(default)]
    pub endpoint: String,

    /// Credential type ("X509Certificate" or "ServiceAccountToken")
    #[serde(default)]
    pub credential_type: String,

    /// Kubernetes version of the remote cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Registration phase
///
/// Deletion is not a phase: it is inferred from the deletion timestamp.
#[serde(rename_all = "PascalCase")]
pub enum RegistrationPhase {
    /// Registration not started yet
    #[default]
    Pending,

    /// Registration in progress
    Progressing,

    /// Cluster registered
    Ready,

    /// Registration failed; only a spec change retries it
    Failed,
}

impl std::fmt::Display for RegistrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Progressing => "Progressing",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}
