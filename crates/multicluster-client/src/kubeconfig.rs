//! Kubeconfig loading
//!
//! Turns a kubeconfig-like document into a [`ClusterConfig`]: the API
//! server endpoint, CA data and the auth info of the selected context.
//! Loading is a pure parse; nothing is contacted here.
//!
//! Descriptors come from users of the hub, so only inline `*-data` fields
//! are accepted. File references would be read from the controller's own
//! filesystem and are rejected.

use crate::error::ClusterClientError;
use crate::registry_trait::CredentialLoader;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Cluster name reserved for the hub (local) cluster.
pub const CLUSTER_LOCAL_NAME: &str = "local";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawKubeconfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    current_context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: RawCluster,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawCluster {
    #[serde(default)]
    server: String,
    certificate_authority_data: Option<String>,
    certificate_authority: Option<PathBuf>,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: RawUser,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawUser {
    token: Option<String>,
    client_certificate_data: Option<String>,
    client_key_data: Option<String>,
    client_certificate: Option<PathBuf>,
    client_key: Option<PathBuf>,
    exec: Option<ExecConfig>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: RawContext,
}

#[derive(Debug, Deserialize)]
struct RawContext {
    cluster: String,
    user: String,
}

/// External credential plugin referenced by a kubeconfig user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    /// Plugin API version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Command to execute
    pub command: String,
    /// Command arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment for the command
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<ExecEnvVar>,
}

/// Environment variable passed to an exec plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEnvVar {
    /// Variable name
    pub name: String,
    /// Variable value
    pub value: String,
}

/// API server coordinates of the remote cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterEndpoint {
    /// API server URL
    pub server: String,
    /// PEM CA bundle
    pub certificate_authority_data: Option<Vec<u8>>,
    /// Skip TLS verification of the API server
    pub insecure_skip_tls_verify: bool,
}

/// Credentials of the remote cluster user.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    /// Bearer token
    pub token: Option<String>,
    /// PEM client certificate
    pub client_certificate_data: Option<Vec<u8>>,
    /// PEM client key
    pub client_key_data: Option<Vec<u8>>,
    /// Exec credential plugin
    pub exec: Option<ExecConfig>,
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("client_certificate_data", &self.client_certificate_data.is_some())
            .field("client_key_data", &self.client_key_data.as_ref().map(|_| "<redacted>"))
            .field("exec", &self.exec)
            .finish()
    }
}

/// Kind of credential a cluster is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialType {
    /// Client certificate authentication
    X509Certificate,
    /// Bearer token or exec plugin authentication
    ServiceAccountToken,
}

impl CredentialType {
    /// Name used in labels and status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X509Certificate => "X509Certificate",
            Self::ServiceAccountToken => "ServiceAccountToken",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured credential for one remote cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Name the cluster is registered under
    pub cluster_name: String,
    /// Namespace to create in the remote cluster
    pub create_namespace: String,
    /// Context of the kubeconfig this config was taken from
    pub context_name: String,
    /// API server coordinates
    pub cluster: ClusterEndpoint,
    /// User credentials
    pub auth_info: AuthInfo,
    /// Labels for the credential secret
    pub labels: BTreeMap<String, String>,
    /// Display name
    pub alias: Option<String>,
}

impl ClusterConfig {
    /// Parses a kubeconfig document.
    pub fn from_yaml(raw: &str) -> Result<Self, ClusterClientError> {
        let kubeconfig: RawKubeconfig = serde_yaml::from_str(raw)?;

        let context = match kubeconfig.current_context.as_deref().filter(|c| !c.is_empty()) {
            Some(current) => kubeconfig
                .contexts
                .iter()
                .find(|c| c.name == current)
                .ok_or_else(|| {
                    ClusterClientError::InvalidKubeconfig(format!(
                        "current-context {current:?} not found in contexts"
                    ))
                })?,
            None => match kubeconfig.contexts.as_slice() {
                [only] => only,
                [] => {
                    return Err(ClusterClientError::InvalidKubeconfig(
                        "no contexts defined".to_string(),
                    ));
                }
                _ => {
                    return Err(ClusterClientError::InvalidKubeconfig(
                        "current-context is not set and multiple contexts are defined".to_string(),
                    ));
                }
            },
        };

        let cluster = kubeconfig
            .clusters
            .iter()
            .find(|c| c.name == context.context.cluster)
            .ok_or_else(|| {
                ClusterClientError::InvalidKubeconfig(format!(
                    "cluster {:?} referenced by context {:?} not found",
                    context.context.cluster, context.name
                ))
            })?;

        let user = kubeconfig
            .users
            .iter()
            .find(|u| u.name == context.context.user)
            .ok_or_else(|| {
                ClusterClientError::InvalidKubeconfig(format!(
                    "user {:?} referenced by context {:?} not found",
                    context.context.user, context.name
                ))
            })?;

        if cluster.cluster.server.trim().is_empty() {
            return Err(ClusterClientError::InvalidKubeconfig(format!(
                "cluster {:?} has no server endpoint",
                cluster.name
            )));
        }

        let endpoint = ClusterEndpoint {
            server: cluster.cluster.server.clone(),
            certificate_authority_data: inline_data(
                "certificate-authority",
                cluster.cluster.certificate_authority_data.as_deref(),
                cluster.cluster.certificate_authority.as_deref(),
            )?,
            insecure_skip_tls_verify: cluster.cluster.insecure_skip_tls_verify,
        };

        let auth_info = AuthInfo {
            token: user.user.token.clone().filter(|t| !t.is_empty()),
            client_certificate_data: inline_data(
                "client-certificate",
                user.user.client_certificate_data.as_deref(),
                user.user.client_certificate.as_deref(),
            )?,
            client_key_data: inline_data(
                "client-key",
                user.user.client_key_data.as_deref(),
                user.user.client_key.as_deref(),
            )?,
            exec: user.user.exec.clone(),
        };

        Ok(Self {
            cluster_name: cluster.name.clone(),
            create_namespace: String::new(),
            context_name: context.name.clone(),
            cluster: endpoint,
            auth_info,
            labels: BTreeMap::new(),
            alias: None,
        })
    }

    /// Sets the name the cluster is registered under.
    #[must_use]
    pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    /// Sets the namespace to create in the remote cluster.
    #[must_use]
    pub fn with_create_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.create_namespace = namespace.into();
        self
    }

    /// Sets the labels for the credential secret.
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias.filter(|a| !a.is_empty());
        self
    }

    /// Checks the cluster name is usable.
    pub fn validate(&self) -> Result<(), ClusterClientError> {
        if self.cluster_name.is_empty() {
            return Err(ClusterClientError::Validation(
                "cluster name cannot be empty".to_string(),
            ));
        }
        if self.cluster_name == CLUSTER_LOCAL_NAME {
            return Err(ClusterClientError::Validation(format!(
                "cluster name cannot be '{CLUSTER_LOCAL_NAME}', it is reserved"
            )));
        }
        Ok(())
    }

    /// Infers the credential type from which auth fields are set.
    // Only the token and certificate shapes are distinguished; anything that
    // is neither a token nor an exec plugin is reported as a certificate.
    pub fn credential_type(&self) -> CredentialType {
        if self.auth_info.token.as_ref().is_some_and(|t| !t.is_empty())
            || self.auth_info.exec.is_some()
        {
            CredentialType::ServiceAccountToken
        } else {
            CredentialType::X509Certificate
        }
    }
}

/// Decodes the inline `<field>-data` value. A `<field>` file reference is
/// an error, even next to inline data.
fn inline_data(
    field: &str,
    data: Option<&str>,
    file: Option<&Path>,
) -> Result<Option<Vec<u8>>, ClusterClientError> {
    if file.is_some_and(|f| !f.as_os_str().is_empty()) {
        return Err(ClusterClientError::InvalidKubeconfig(format!(
            "{field} file references are not supported, use {field}-data"
        )));
    }
    data.map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|encoded| {
            STANDARD.decode(encoded).map_err(|e| {
                ClusterClientError::InvalidKubeconfig(format!("{field}-data is not valid base64: {e}"))
            })
        })
        .transpose()
}

/// Loads kubeconfig documents from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeconfigLoader;

impl CredentialLoader for KubeconfigLoader {
    fn load(&self, path: &Path) -> Result<ClusterConfig, ClusterClientError> {
        let raw = std::fs::read_to_string(path)?;
        ClusterConfig::from_yaml(&raw)
    }
}
