//! Reconciliation logic for ClusterRegistration records.
//!
//! Each pass re-reads the record and takes at most one step:
//! - deletion: detach the cluster and release the finalizer (`deletion`)
//! - install the finalizer, then come back
//! - settled records are left alone
//! - announce `Progressing`, then come back
//! - load and validate the descriptor (`credentials`), register, and
//!   project the outcome into status (`status`)
//!
//! Spec errors end in `Failed` and wait for a new generation. Registration
//! errors put the record back to `Progressing` and ask for a fixed-delay
//! retry. The name a credential was stored under is kept in status so a
//! renamed cluster can be detached under its old name.

mod credentials;
mod deletion;
mod status;

use crate::backoff::ExponentialBackoff;
use crate::error::ControllerError;
use crate::metrics;
use crate::store::RegistrationStore;
use crds::{CLUSTER_REGISTRATION_FINALIZER, ClusterRegistration, RegistrationPhase};
use multicluster_client::{
    CLUSTER_LOCAL_NAME, ClusterConfig, CredentialLoader, Detacher, RegisteredCluster, Registrar,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default delay before a failed registration is retried.
pub const DEFAULT_REGISTRATION_RETRY: Duration = Duration::from_secs(30);

/// Default deadline for a register or detach call.
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// What the dispatcher should do after a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the record changes
    AwaitChange,
    /// A milestone was persisted; run another pass
    Continue,
    /// Try again after the given delay
    RetryAfter(Duration),
}

/// Reconciles ClusterRegistration records.
pub struct Reconciler {
    pub(crate) store: Arc<dyn RegistrationStore>,
    loader: Arc<dyn CredentialLoader>,
    registrar: Arc<dyn Registrar>,
    detacher: Arc<dyn Detacher>,
    registration_retry: Duration,
    collaborator_timeout: Duration,
    /// Error backoff per record (namespace/name -> backoff)
    backoff_states: Arc<Mutex<HashMap<String, ExponentialBackoff>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("registration_retry", &self.registration_retry)
            .field("collaborator_timeout", &self.collaborator_timeout)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        loader: Arc<dyn CredentialLoader>,
        registrar: Arc<dyn Registrar>,
        detacher: Arc<dyn Detacher>,
    ) -> Self {
        Self {
            store,
            loader,
            registrar,
            detacher,
            registration_retry: DEFAULT_REGISTRATION_RETRY,
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Delay before a failed registration is retried.
    #[must_use]
    pub fn with_registration_retry(mut self, delay: Duration) -> Self {
        self.registration_retry = delay;
        self
    }

    /// Deadline for each register and detach call.
    #[must_use]
    pub fn with_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    /// Run one reconciliation pass for the record `namespace/name`.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        metrics::increment_reconciliations();

        let Some(record) = self.store.get(namespace, name).await? else {
            debug!("ClusterRegistration {}/{} no longer exists, nothing to do", namespace, name);
            return Ok(ReconcileOutcome::AwaitChange);
        };

        if record.is_being_deleted() {
            return self.reconcile_deletion(&record).await;
        }

        if !record.has_finalizer() {
            info!("Adding finalizer to ClusterRegistration {}/{}", namespace, name);
            let mut finalizers = record.metadata.finalizers.clone().unwrap_or_default();
            finalizers.push(CLUSTER_REGISTRATION_FINALIZER.to_string());
            self.store.set_finalizers(&record, finalizers).await?;
            return Ok(ReconcileOutcome::Continue);
        }

        if record.is_settled() {
            debug!("ClusterRegistration {}/{} is Ready for generation {}", namespace, name, record.generation());
            return Ok(ReconcileOutcome::AwaitChange);
        }

        // Failed is terminal until the spec changes
        if record.phase() == RegistrationPhase::Failed
            && record.status.as_ref().is_some_and(|s| s.observed_generation == record.generation())
        {
            debug!("ClusterRegistration {}/{} failed for generation {}, waiting for a spec change", namespace, name, record.generation());
            return Ok(ReconcileOutcome::AwaitChange);
        }

        let cluster_name = record.resolved_cluster_name();
        if cluster_name == CLUSTER_LOCAL_NAME {
            let message = format!("cluster name cannot be '{CLUSTER_LOCAL_NAME}', it is reserved");
            self.project_failure(&record, &message).await;
            return Ok(ReconcileOutcome::AwaitChange);
        }

        if !matches!(record.phase(), RegistrationPhase::Progressing | RegistrationPhase::Ready) {
            info!("Registering cluster {} for ClusterRegistration {}/{}", cluster_name, namespace, name);
            self.write_status(&record, status::progressing(&record, &cluster_name)).await?;
            return Ok(ReconcileOutcome::Continue);
        }

        let config = match self.load_credential(&record, &cluster_name)? {
            Ok(config) => config,
            Err(message) => {
                self.project_failure(&record, &message).await;
                return Ok(ReconcileOutcome::AwaitChange);
            }
        };

        // A renamed cluster leaves its old credential behind unless detached
        if let Some(previous) = record.registered_cluster_name().filter(|p| *p != cluster_name) {
            info!(
                "ClusterRegistration {}/{} renamed cluster {} to {}, detaching the old name",
                namespace, name, previous, cluster_name
            );
            if let Err(e) = self.detach_if_registered(previous).await {
                let message = collaborator_message(&e);
                warn!(
                    "Failed to detach previous cluster {} for ClusterRegistration {}/{}, retrying in {}s: {}",
                    previous, namespace, name, self.registration_retry.as_secs(), message
                );
                self.write_status(&record, status::retrying(&record, &message)).await?;
                return Ok(ReconcileOutcome::RetryAfter(self.registration_retry));
            }
        }

        match self.register(&config).await {
            Ok(registered) => {
                info!(
                    "Cluster {} registered for ClusterRegistration {}/{} ({}, {})",
                    cluster_name, namespace, name, registered.endpoint, registered.credential_type
                );
                self.write_status(&record, status::ready(&record, &cluster_name, &registered)).await?;
                metrics::increment_registrations();
                Ok(ReconcileOutcome::AwaitChange)
            }
            Err(e) => {
                let message = collaborator_message(&e);
                warn!(
                    "Failed to register cluster {} for ClusterRegistration {}/{}, retrying in {}s: {}",
                    cluster_name, namespace, name, self.registration_retry.as_secs(), message
                );
                self.write_status(&record, status::retrying(&record, &message)).await?;
                Ok(ReconcileOutcome::RetryAfter(self.registration_retry))
            }
        }
    }

    /// Stage the descriptor, load it and apply the record's names.
    ///
    /// The outer error is an I/O failure staging the descriptor; the inner
    /// error is a permanent problem with the descriptor itself.
    fn load_credential(
        &self,
        record: &ClusterRegistration,
        cluster_name: &str,
    ) -> Result<Result<ClusterConfig, String>, ControllerError> {
        let staged = credentials::stage_descriptor(&record.spec.connection_descriptor)
            .map_err(|e| ControllerError::Io(format!("failed to stage connection descriptor: {e}")))?;

        let loaded = self.loader.load(staged.path());
        drop(staged);

        Ok(loaded
            .and_then(|config| credentials::resolve(config, record, cluster_name))
            .map_err(|e| e.to_string()))
    }

    async fn register(&self, config: &ClusterConfig) -> Result<RegisteredCluster, ControllerError> {
        match tokio::time::timeout(self.collaborator_timeout, self.registrar.register(config)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ControllerError::Timeout("registration", self.collaborator_timeout)),
        }
    }

    async fn detach(&self, cluster_name: &str) -> Result<(), ControllerError> {
        match tokio::time::timeout(self.collaborator_timeout, self.detacher.detach(cluster_name)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ControllerError::Timeout("detachment", self.collaborator_timeout)),
        }
    }

    /// Next error backoff for a record, advancing its sequence.
    pub fn next_error_backoff(&self, resource_key: &str) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .entry(resource_key.to_string())
                .or_default()
                .next_backoff(),
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                ExponentialBackoff::default().next_backoff()
            }
        }
    }

    /// Reset a record's error backoff after a successful pass.
    pub fn reset_error_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}

/// Collaborator errors are reported verbatim, without the controller prefix.
fn collaborator_message(error: &ControllerError) -> String {
    match error {
        ControllerError::Cluster(inner) => inner.to_string(),
        other => other.to_string(),
    }
}
