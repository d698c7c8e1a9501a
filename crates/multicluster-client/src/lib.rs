//! Multicluster client
//!
//! Loads kubeconfig-like connection descriptors and registers the described
//! clusters with the hub so the rest of the platform can discover them.
//!
//! # Example
//!
//! ```no_run
//! use multicluster_client::{CredentialLoader, KubeClusterRegistry, KubeconfigLoader, Registrar};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = kube::Client::try_default().await?;
//! let registry = KubeClusterRegistry::new(hub, "vela-system");
//!
//! let config = KubeconfigLoader
//!     .load(std::path::Path::new("/tmp/edge.kubeconfig"))?
//!     .with_cluster_name("edge-1")
//!     .with_create_namespace("vela-system");
//! config.validate()?;
//!
//! let registered = registry.register(&config).await?;
//! println!("{} uses {}", registered.endpoint, registered.credential_type);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod kubeconfig;
#[path = "trait.rs"]
pub mod registry_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{ANNOTATION_CLUSTER_ALIAS, KubeClusterRegistry, LABEL_CREDENTIAL_TYPE};
pub use error::ClusterClientError;
pub use kubeconfig::{
    AuthInfo, CLUSTER_LOCAL_NAME, ClusterConfig, ClusterEndpoint, CredentialType, ExecConfig,
    KubeconfigLoader,
};
pub use registry_trait::{CredentialLoader, Detacher, RegisteredCluster, Registrar};
#[cfg(feature = "test-util")]
pub use mock::{MockClusterRegistry, MockCredentialLoader};
