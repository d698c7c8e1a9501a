//! Multicluster client errors

use thiserror::Error;

/// Errors raised while loading, validating, registering or detaching a cluster
#[derive(Debug, Error)]
pub enum ClusterClientError {
    /// Kubernetes API error (hub or remote cluster)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubeconfig or a file it references could not be read
    #[error("failed to read kubeconfig: {0}")]
    Io(#[from] std::io::Error),

    /// Kubeconfig is not a parsable document
    #[error("failed to parse kubeconfig: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Kubeconfig parsed but is structurally incomplete
    #[error("invalid kubeconfig: {0}")]
    InvalidKubeconfig(String),

    /// Cluster configuration failed validation
    #[error("{0}")]
    Validation(String),

    /// A client for the remote cluster could not be built
    #[error("failed to connect to cluster: {0}")]
    Connection(String),

    /// Cluster credential does not exist
    #[error("cluster not found: {0}")]
    NotFound(String),

    /// Credential secret could not be written
    #[error("failed to register cluster: {0}")]
    Registration(String),
}

impl ClusterClientError {
    /// True for "already absent" outcomes that callers may treat as success.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }
}
