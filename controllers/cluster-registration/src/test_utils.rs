//! Test utilities for unit testing the reconciler
//!
//! Provides an in-memory record store that behaves like the API server for
//! the parts the reconciler relies on (resource versions, generations,
//! finalizer-gated deletion) and helpers for building records.

use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::store::RegistrationStore;
use chrono::Utc;
use crds::{ClusterRegistration, ClusterRegistrationSpec, ClusterRegistrationStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use multicluster_client::{MockClusterRegistry, MockCredentialLoader};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Single-context kubeconfig with client certificate auth
pub const VALID_KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
current-context: prod
clusters:
- name: prod
  cluster:
    server: https://10.0.0.1:6443
    certificate-authority-data: Y2EtZGF0YQ==
contexts:
- name: prod
  context:
    cluster: prod
    user: admin
users:
- name: admin
  user:
    client-certificate-data: Y2VydA==
    client-key-data: a2V5
"#;

/// Helper to create a test ClusterRegistration
pub fn create_test_registration(
    name: &str,
    namespace: &str,
    cluster_name: Option<&str>,
    descriptor: &str,
) -> ClusterRegistration {
    ClusterRegistration {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: ClusterRegistrationSpec {
            cluster_name: cluster_name.map(str::to_string),
            connection_descriptor: descriptor.to_string(),
            ..Default::default()
        },
        status: None,
    }
}

type Key = (String, String);

fn key_of(record: &ClusterRegistration) -> Key {
    (
        record.metadata.namespace.clone().unwrap_or_default(),
        record.metadata.name.clone().unwrap_or_default(),
    )
}

/// In-memory record store
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<Key, ClusterRegistration>>>,
    next_version: Arc<AtomicUsize>,
    status_writes: Arc<AtomicUsize>,
    fail_next_write: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_version(&self, record: &mut ClusterRegistration) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        record.metadata.resource_version = Some(version.to_string());
    }

    /// Create a record as the user would
    pub fn create(&self, mut record: ClusterRegistration) {
        self.bump_version(&mut record);
        self.records.lock().unwrap().insert(key_of(&record), record);
    }

    /// Replace the spec as the user would, bumping the generation
    pub fn update_spec(&self, namespace: &str, name: &str, spec: ClusterRegistrationSpec) {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&(namespace.to_string(), name.to_string()))
            .unwrap();
        record.spec = spec;
        record.metadata.generation = Some(record.metadata.generation.unwrap_or_default() + 1);
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        record.metadata.resource_version = Some(version.to_string());
    }

    /// Request deletion. Records without finalizers disappear immediately.
    pub fn delete(&self, namespace: &str, name: &str) {
        let key = (namespace.to_string(), name.to_string());
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(&key) else {
            return;
        };
        if record.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            records.remove(&key);
            return;
        }
        record.metadata.deletion_timestamp = Some(Time(Utc::now()));
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        record.metadata.resource_version = Some(version.to_string());
    }

    /// Current copy of a record
    pub fn record(&self, namespace: &str, name: &str) -> Option<ClusterRegistration> {
        self.records
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Current status of a record
    pub fn status(&self, namespace: &str, name: &str) -> Option<ClusterRegistrationStatus> {
        self.record(namespace, name).and_then(|r| r.status)
    }

    /// Number of status writes accepted so far
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    /// Reject the next write with a conflict
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    fn check_write(&self, record: &ClusterRegistration) -> Result<Key, ControllerError> {
        let key = key_of(record);
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(ControllerError::Conflict("injected conflict".to_string()));
        }
        let records = self.records.lock().unwrap();
        let stored = records
            .get(&key)
            .ok_or_else(|| ControllerError::Conflict(format!("{}/{} not found", key.0, key.1)))?;
        if stored.metadata.resource_version != record.metadata.resource_version {
            return Err(ControllerError::Conflict(
                "the object has been modified; please apply your changes to the latest version".to_string(),
            ));
        }
        Ok(key)
    }
}

#[async_trait::async_trait]
impl RegistrationStore for InMemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ClusterRegistration>, ControllerError> {
        Ok(self.record(namespace, name))
    }

    async fn set_finalizers(&self, record: &ClusterRegistration, finalizers: Vec<String>) -> Result<(), ControllerError> {
        let key = self.check_write(record)?;
        let mut records = self.records.lock().unwrap();
        let deleting = {
            let stored = records.get_mut(&key).unwrap();
            stored.metadata.finalizers = Some(finalizers.clone());
            let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
            stored.metadata.resource_version = Some(version.to_string());
            stored.metadata.deletion_timestamp.is_some()
        };
        if deleting && finalizers.is_empty() {
            records.remove(&key);
        }
        Ok(())
    }

    async fn update_status(&self, record: &ClusterRegistration, status: &ClusterRegistrationStatus) -> Result<(), ControllerError> {
        let key = self.check_write(record)?;
        let mut records = self.records.lock().unwrap();
        let stored = records.get_mut(&key).unwrap();
        stored.status = Some(status.clone());
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        stored.metadata.resource_version = Some(version.to_string());
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Reconciler wired to fresh in-memory collaborators
pub struct TestHarness {
    pub store: InMemoryStore,
    pub registry: MockClusterRegistry,
    pub loader: MockCredentialLoader,
    pub reconciler: Reconciler,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let registry = MockClusterRegistry::new();
        let loader = MockCredentialLoader::new();
        let reconciler = Self::reconciler_for(&store, &registry, &loader);
        Self {
            store,
            registry,
            loader,
            reconciler,
        }
    }

    /// A new reconciler over the same store and collaborators, as after a restart
    pub fn reconciler_for(
        store: &InMemoryStore,
        registry: &MockClusterRegistry,
        loader: &MockCredentialLoader,
    ) -> Reconciler {
        Reconciler::new(
            Arc::new(store.clone()),
            Arc::new(loader.clone()),
            Arc::new(registry.clone()),
            Arc::new(registry.clone()),
        )
    }

    /// Reconcile until the reconciler stops asking for another pass
    pub async fn settle(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        for _ in 0..10 {
            match self.reconciler.reconcile(namespace, name).await? {
                ReconcileOutcome::Continue => continue,
                outcome => return Ok(outcome),
            }
        }
        panic!("reconciliation of {namespace}/{name} did not settle");
    }
}
