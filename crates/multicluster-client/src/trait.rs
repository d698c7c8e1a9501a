//! Cluster registry traits for mocking
//!
//! The reconciler only talks to these traits. The concrete
//! [`KubeClusterRegistry`](crate::KubeClusterRegistry) and
//! [`KubeconfigLoader`](crate::KubeconfigLoader) implement them, and tests
//! use the in-memory implementations from the `test-util` feature.

use crate::error::ClusterClientError;
use crate::kubeconfig::{ClusterConfig, CredentialType};
use std::path::Path;

/// Parses a connection descriptor file into a [`ClusterConfig`].
///
/// Loading must not contact the remote cluster.
pub trait CredentialLoader: Send + Sync {
    /// Load the descriptor at `path`.
    fn load(&self, path: &Path) -> Result<ClusterConfig, ClusterClientError>;
}

/// Makes a cluster discoverable to the rest of the platform.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait Registrar: Send + Sync {
    /// Register the cluster. Re-registering the same name replaces the
    /// existing credential.
    async fn register(&self, config: &ClusterConfig) -> Result<RegisteredCluster, ClusterClientError>;
}

/// Removes a registered cluster.
#[async_trait::async_trait]
pub trait Detacher: Send + Sync {
    /// Detach the cluster. A cluster that is not registered yields an error
    /// for which [`ClusterClientError::is_not_found`] is true.
    async fn detach(&self, cluster_name: &str) -> Result<(), ClusterClientError>;
}

/// What a successful registration reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCluster {
    /// API server endpoint
    pub endpoint: String,
    /// Credential type stored for the cluster
    pub credential_type: CredentialType,
    /// Remote Kubernetes version, when it could be detected
    pub version: Option<String>,
}
