//! Hub-side cluster registry
//!
//! Registers a remote cluster by storing its credential as a labelled
//! secret in the hub's credential namespace, the way the rest of the
//! platform discovers clusters. Registration also makes sure the remote
//! cluster is reachable and has the requested namespace.

use crate::error::ClusterClientError;
use crate::kubeconfig::ClusterConfig;
use crate::registry_trait::{Detacher, RegisteredCluster, Registrar};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Label carrying the credential type of a cluster secret.
pub const LABEL_CREDENTIAL_TYPE: &str = "cluster.core.oam.dev/cluster-credential-type";

/// Annotation carrying the display name of a cluster.
pub const ANNOTATION_CLUSTER_ALIAS: &str = "cluster.core.oam.dev/cluster-alias";

/// Field manager used for server-side apply.
pub const FIELD_MANAGER: &str = "cluster-registration-controller";

const REMOTE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REMOTE_READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Cluster registry backed by secrets in the hub cluster.
#[derive(Clone)]
pub struct KubeClusterRegistry {
    hub: Client,
    credential_namespace: String,
}

impl std::fmt::Debug for KubeClusterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterRegistry")
            .field("credential_namespace", &self.credential_namespace)
            .finish_non_exhaustive()
    }
}

impl KubeClusterRegistry {
    /// Create a registry writing credentials into `credential_namespace`.
    pub fn new(hub: Client, credential_namespace: impl Into<String>) -> Self {
        Self {
            hub,
            credential_namespace: credential_namespace.into(),
        }
    }

    /// Namespace holding cluster credential secrets.
    pub fn credential_namespace(&self) -> &str {
        &self.credential_namespace
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.hub.clone(), &self.credential_namespace)
    }

    /// Build a client for the remote cluster described by `config`.
    ///
    /// Only the decoded endpoint, CA and token or client certificate are
    /// used. Exec plugins are never run inside the controller.
    pub async fn remote_client(config: &ClusterConfig) -> Result<Client, ClusterClientError> {
        let kubeconfig: Kubeconfig = serde_json::from_value(remote_kubeconfig(config))
            .map_err(|e| ClusterClientError::Connection(format!("failed to build config: {e}")))?;
        let options = KubeConfigOptions {
            context: Some(config.context_name.clone()),
            ..Default::default()
        };
        let mut kube_config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| ClusterClientError::Connection(format!("failed to build config: {e}")))?;
        kube_config.connect_timeout = Some(REMOTE_CONNECT_TIMEOUT);
        kube_config.read_timeout = Some(REMOTE_READ_TIMEOUT);

        Client::try_from(kube_config)
            .map_err(|e| ClusterClientError::Connection(format!("failed to create client: {e}")))
    }

    async fn ensure_namespace(remote: &Client, namespace: &str) -> Result<(), ClusterClientError> {
        let namespaces: Api<Namespace> = Api::all(remote.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match namespaces.create(&PostParams::default(), &ns).await {
            Ok(_) => {
                info!("Created namespace {} in remote cluster", namespace);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!("Namespace {} already exists in remote cluster", namespace);
                Ok(())
            }
            Err(e) => Err(ClusterClientError::Registration(format!(
                "failed to create namespace {namespace} in remote cluster: {e}"
            ))),
        }
    }

    async fn detect_version(remote: &Client) -> Option<String> {
        match remote.apiserver_version().await {
            Ok(info) => Some(info.git_version),
            Err(e) => {
                warn!("Failed to detect remote cluster version: {}", e);
                None
            }
        }
    }
}

/// Kubeconfig for reaching the remote cluster, rebuilt from the decoded
/// fields of `config` so nothing but inline credentials can be honoured.
pub(crate) fn remote_kubeconfig(config: &ClusterConfig) -> serde_json::Value {
    let mut cluster = serde_json::json!({ "server": config.cluster.server });
    if let Some(ca) = &config.cluster.certificate_authority_data {
        cluster["certificate-authority-data"] = STANDARD.encode(ca).into();
    }
    if config.cluster.insecure_skip_tls_verify {
        cluster["insecure-skip-tls-verify"] = true.into();
    }

    let mut user = serde_json::json!({});
    if let Some(token) = &config.auth_info.token {
        user["token"] = token.clone().into();
    } else if let (Some(cert), Some(key)) = (
        &config.auth_info.client_certificate_data,
        &config.auth_info.client_key_data,
    ) {
        user["client-certificate-data"] = STANDARD.encode(cert).into();
        user["client-key-data"] = STANDARD.encode(key).into();
    }

    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "current-context": config.context_name,
        "clusters": [{ "name": config.context_name, "cluster": cluster }],
        "users": [{ "name": config.context_name, "user": user }],
        "contexts": [{
            "name": config.context_name,
            "context": { "cluster": config.context_name, "user": config.context_name },
        }],
    })
}

/// Builds the credential secret for `config`.
pub fn credential_secret(config: &ClusterConfig, namespace: &str) -> Secret {
    let credential_type = config.credential_type();

    let mut labels = config.labels.clone();
    labels.insert(
        LABEL_CREDENTIAL_TYPE.to_string(),
        credential_type.as_str().to_string(),
    );

    let annotations = config.alias.as_ref().map(|alias| {
        BTreeMap::from([(ANNOTATION_CLUSTER_ALIAS.to_string(), alias.clone())])
    });

    let mut data = BTreeMap::new();
    data.insert(
        "endpoint".to_string(),
        ByteString(config.cluster.server.clone().into_bytes()),
    );
    if let Some(ca) = &config.cluster.certificate_authority_data {
        data.insert("ca.crt".to_string(), ByteString(ca.clone()));
    }
    if let Some(token) = &config.auth_info.token {
        data.insert("token".to_string(), ByteString(token.clone().into_bytes()));
    } else if let Some(exec) = &config.auth_info.exec {
        // ExecConfig only holds strings, so serialization cannot fail
        if let Ok(json) = serde_json::to_vec(exec) {
            data.insert("exec".to_string(), ByteString(json));
        }
    } else {
        if let Some(cert) = &config.auth_info.client_certificate_data {
            data.insert("tls.crt".to_string(), ByteString(cert.clone()));
        }
        if let Some(key) = &config.auth_info.client_key_data {
            data.insert("tls.key".to_string(), ByteString(key.clone()));
        }
    }

    Secret {
        metadata: ObjectMeta {
            name: Some(config.cluster_name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            annotations,
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl Registrar for KubeClusterRegistry {
    async fn register(&self, config: &ClusterConfig) -> Result<RegisteredCluster, ClusterClientError> {
        config.validate()?;

        info!(
            "Registering cluster {} ({}) into {}",
            config.cluster_name, config.cluster.server, self.credential_namespace
        );

        // Exec credentials only work where the plugin is installed, which is
        // never the controller; store them without touching the remote cluster
        let version = if config.auth_info.token.is_none() && config.auth_info.exec.is_some() {
            warn!(
                "Cluster {} uses an exec credential, skipping namespace creation and version detection",
                config.cluster_name
            );
            None
        } else {
            let remote = Self::remote_client(config).await?;
            Self::ensure_namespace(&remote, &config.create_namespace).await?;
            Self::detect_version(&remote).await
        };

        let secret = credential_secret(config, &self.credential_namespace);
        self.secrets()
            .patch(
                &config.cluster_name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&secret),
            )
            .await
            .map_err(|e| {
                ClusterClientError::Registration(format!(
                    "failed to store credential for cluster {}: {e}",
                    config.cluster_name
                ))
            })?;

        info!("Registered cluster {}", config.cluster_name);

        Ok(RegisteredCluster {
            endpoint: config.cluster.server.clone(),
            credential_type: config.credential_type(),
            version,
        })
    }
}

#[async_trait::async_trait]
impl Detacher for KubeClusterRegistry {
    async fn detach(&self, cluster_name: &str) -> Result<(), ClusterClientError> {
        match self.secrets().delete(cluster_name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Detached cluster {}", cluster_name);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                Err(ClusterClientError::NotFound(cluster_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
