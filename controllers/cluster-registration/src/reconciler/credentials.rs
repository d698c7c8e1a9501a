//! Connection descriptor handling.
//!
//! The descriptor is staged in a temporary file for the credential loader
//! and the file is removed when the returned guard is dropped, whichever
//! way the pass exits.

use crds::ClusterRegistration;
use multicluster_client::{ClusterClientError, ClusterConfig};
use std::io::Write;
use tempfile::NamedTempFile;

/// Write `descriptor` to a fresh temporary file.
pub(crate) fn stage_descriptor(descriptor: &str) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("cluster-registration-")
        .suffix(".kubeconfig")
        .tempfile()?;
    file.write_all(descriptor.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Apply the record's resolved names to a loaded credential and validate it.
pub(crate) fn resolve(
    config: ClusterConfig,
    record: &ClusterRegistration,
    cluster_name: &str,
) -> Result<ClusterConfig, ClusterClientError> {
    let config = config
        .with_cluster_name(cluster_name)
        .with_create_namespace(record.resolved_create_namespace())
        .with_labels(record.spec.labels.clone())
        .with_alias(record.spec.alias.clone());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{VALID_KUBECONFIG, create_test_registration};
    use multicluster_client::{CredentialLoader, KubeconfigLoader};

    #[test]
    fn test_staged_file_removed_on_drop() {
        let staged = stage_descriptor("apiVersion: v1").unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "apiVersion: v1");

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_resolve_applies_record_fields() {
        let mut record = create_test_registration("edge", "fleet", Some("prod-west"), VALID_KUBECONFIG);
        record.spec.alias = Some("Production West".to_string());
        record.spec.labels.insert("env".to_string(), "prod".to_string());

        let staged = stage_descriptor(VALID_KUBECONFIG).unwrap();
        let loaded = KubeconfigLoader.load(staged.path()).unwrap();
        let config = resolve(loaded, &record, &record.resolved_cluster_name()).unwrap();

        assert_eq!(config.cluster_name, "prod-west");
        assert_eq!(config.create_namespace, "vela-system");
        assert_eq!(config.alias.as_deref(), Some("Production West"));
        assert_eq!(config.labels.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_resolve_rejects_empty_name() {
        let record = create_test_registration("edge", "fleet", None, VALID_KUBECONFIG);
        let staged = stage_descriptor(VALID_KUBECONFIG).unwrap();
        let loaded = KubeconfigLoader.load(staged.path()).unwrap();

        let err = resolve(loaded, &record, "").unwrap_err();
        assert_eq!(err.to_string(), "cluster name cannot be empty");
    }
}
