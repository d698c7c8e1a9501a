//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `cluster_registration_reconciliations_total` - Total number of reconciliation passes
//! - `cluster_registration_reconciliation_errors_total` - Passes that returned an error
//! - `cluster_registration_registrations_total` - Successful cluster registrations
//! - `cluster_registration_detachments_total` - Successful cluster detachments
//! - `cluster_registration_failed_projections_total` - Records moved to the Failed phase

use anyhow::Result;
use prometheus::{IntCounter, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::new(name, help)
        .unwrap_or_else(|e| panic!("Failed to create metric {name} - this should never happen: {e}"))
}

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "cluster_registration_reconciliations_total",
        "Total number of reconciliation passes",
    )
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "cluster_registration_reconciliation_errors_total",
        "Total number of reconciliation passes that returned an error",
    )
});

static REGISTRATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "cluster_registration_registrations_total",
        "Total number of successful cluster registrations",
    )
});

static DETACHMENTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "cluster_registration_detachments_total",
        "Total number of successful cluster detachments",
    )
});

static FAILED_PROJECTIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "cluster_registration_failed_projections_total",
        "Total number of records moved to the Failed phase",
    )
});

/// Register all metrics with the registry
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REGISTRATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DETACHMENTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FAILED_PROJECTIONS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn increment_registrations() {
    REGISTRATIONS_TOTAL.inc();
}

pub fn increment_detachments() {
    DETACHMENTS_TOTAL.inc();
}

pub fn increment_failed_projections() {
    FAILED_PROJECTIONS_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = REGISTRATIONS_TOTAL.get();
        increment_registrations();
        assert_eq!(REGISTRATIONS_TOTAL.get(), before + 1);
    }
}
