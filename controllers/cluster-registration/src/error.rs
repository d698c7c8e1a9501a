//! Controller-specific error types.
//!
//! Errors returned from a reconciliation pass are redelivered by the
//! dispatcher with per-key backoff. Permanent spec errors never reach this
//! type: they are projected into the record's status instead.

use kube::Error as KubeError;
use multicluster_client::ClusterClientError;
use thiserror::Error;

/// Errors that can occur in the cluster registration controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error (record reads, finalizer and status writes)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Registrar or detacher error
    #[error("Cluster client error: {0}")]
    Cluster(#[from] ClusterClientError),

    /// Record could not be serialized into a patch
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record was modified concurrently
    #[error("Conflicting update: {0}")]
    Conflict(String),

    /// Local file handling failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A collaborator call missed its deadline
    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, std::time::Duration),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
