//! Kubernetes resource watcher.
//!
//! Runs a `kube_runtime::Controller` over ClusterRegistration records and
//! adapts the reconciler's [`ReconcileOutcome`] to requeue actions. The
//! runtime never runs two passes for the same record at once.

use crate::error::ControllerError;
use crate::metrics;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crds::ClusterRegistration;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{
    Controller, watcher,
    controller::{Action, Config as ControllerConfig},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Delay before the pass that follows a persisted milestone.
const CONTINUE_DELAY: Duration = Duration::from_secs(1);

/// Shared state handed to every reconciliation.
#[derive(Debug)]
pub struct Context {
    pub reconciler: Arc<Reconciler>,
    pub resync_interval: Option<Duration>,
}

/// Map a reconciler outcome to a requeue action.
pub fn to_action(outcome: ReconcileOutcome, resync_interval: Option<Duration>) -> Action {
    match outcome {
        ReconcileOutcome::AwaitChange => match resync_interval {
            Some(interval) => Action::requeue(interval),
            None => Action::await_change(),
        },
        ReconcileOutcome::Continue => Action::requeue(CONTINUE_DELAY),
        ReconcileOutcome::RetryAfter(delay) => Action::requeue(delay),
    }
}

fn resource_key(obj: &ClusterRegistration) -> (String, String) {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

async fn reconcile(obj: Arc<ClusterRegistration>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let (namespace, name) = resource_key(&obj);
    debug!("Reconciling ClusterRegistration {}/{}", namespace, name);

    let outcome = ctx.reconciler.reconcile(&namespace, &name).await?;
    ctx.reconciler.reset_error_backoff(&format!("{namespace}/{name}"));
    Ok(to_action(outcome, ctx.resync_interval))
}

fn error_policy(obj: Arc<ClusterRegistration>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let (namespace, name) = resource_key(&obj);
    let key = format!("{namespace}/{name}");
    let backoff = ctx.reconciler.next_error_backoff(&key);
    metrics::increment_reconciliation_errors();
    error!(
        "Reconciliation error for ClusterRegistration {}: {} (retrying in {}s)",
        key,
        error,
        backoff.as_secs()
    );
    Action::requeue(backoff)
}

/// Watch ClusterRegistration records until the stream ends.
pub async fn watch_registrations(api: Api<ClusterRegistration>, ctx: Arc<Context>) -> Result<(), ControllerError> {
    info!("Starting ClusterRegistration watcher");

    // Debounce batches the watch events caused by our own status writes
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_millis(500))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled ClusterRegistration {}", obj.name),
                Err(e) => error!("ClusterRegistration controller error: {}", e),
            }
        })
        .await;

    Err(ControllerError::Watch(
        "ClusterRegistration watch stream ended".to_string(),
    ))
}
