//! In-memory cluster registry for unit testing
//!
//! Lets the controller's reconciler be exercised without a hub or a remote
//! cluster. Registered clusters are kept in a map keyed by cluster name.

use crate::error::ClusterClientError;
use crate::kubeconfig::{ClusterConfig, KubeconfigLoader};
use crate::registry_trait::{CredentialLoader, Detacher, RegisteredCluster, Registrar};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock registrar and detacher
#[derive(Clone, Default)]
pub struct MockClusterRegistry {
    clusters: Arc<Mutex<HashMap<String, ClusterConfig>>>,
    register_calls: Arc<AtomicUsize>,
    detach_calls: Arc<AtomicUsize>,
    register_failure: Arc<Mutex<Option<String>>>,
    detach_failure: Arc<Mutex<Option<String>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    version: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for MockClusterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClusterRegistry")
            .field("clusters", &self.cluster_names())
            .finish_non_exhaustive()
    }
}

impl MockClusterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every registration fail with `message` (None clears it)
    pub fn fail_register(&self, message: Option<&str>) {
        *self.register_failure.lock().unwrap() = message.map(str::to_string);
    }

    /// Make every detachment fail with `message` (None clears it)
    pub fn fail_detach(&self, message: Option<&str>) {
        *self.detach_failure.lock().unwrap() = message.map(str::to_string);
    }

    /// Delay every call by `delay`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Version reported for registered clusters
    pub fn set_version(&self, version: Option<&str>) {
        *self.version.lock().unwrap() = version.map(str::to_string);
    }

    /// Seed a registered cluster (for test setup)
    pub fn insert(&self, config: ClusterConfig) {
        self.clusters
            .lock()
            .unwrap()
            .insert(config.cluster_name.clone(), config);
    }

    /// Drop a registered cluster behind the controller's back
    pub fn remove(&self, name: &str) -> bool {
        self.clusters.lock().unwrap().remove(name).is_some()
    }

    /// True if `name` is currently registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.clusters.lock().unwrap().contains_key(name)
    }

    /// The stored config for `name`
    pub fn get(&self, name: &str) -> Option<ClusterConfig> {
        self.clusters.lock().unwrap().get(name).cloned()
    }

    /// Names of all registered clusters, sorted
    pub fn cluster_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clusters.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of register calls so far
    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Number of detach calls so far
    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl Registrar for MockClusterRegistry {
    async fn register(&self, config: &ClusterConfig) -> Result<RegisteredCluster, ClusterClientError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;

        if let Some(message) = self.register_failure.lock().unwrap().clone() {
            return Err(ClusterClientError::Registration(message));
        }
        config.validate()?;

        self.insert(config.clone());
        Ok(RegisteredCluster {
            endpoint: config.cluster.server.clone(),
            credential_type: config.credential_type(),
            version: self.version.lock().unwrap().clone(),
        })
    }
}

#[async_trait::async_trait]
impl Detacher for MockClusterRegistry {
    async fn detach(&self, cluster_name: &str) -> Result<(), ClusterClientError> {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;

        if let Some(message) = self.detach_failure.lock().unwrap().clone() {
            return Err(ClusterClientError::Connection(message));
        }
        match self.clusters.lock().unwrap().remove(cluster_name) {
            Some(_) => Ok(()),
            None => Err(ClusterClientError::NotFound(cluster_name.to_string())),
        }
    }
}

/// Counting wrapper around [`KubeconfigLoader`]
#[derive(Debug, Clone, Default)]
pub struct MockCredentialLoader {
    calls: Arc<AtomicUsize>,
}

impl MockCredentialLoader {
    /// Create a loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of load calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialLoader for MockCredentialLoader {
    fn load(&self, path: &Path) -> Result<ClusterConfig, ClusterClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        KubeconfigLoader.load(path)
    }
}
