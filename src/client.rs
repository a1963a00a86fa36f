use std::future::Future;
use std::path::Path;

use anyhow::Context;
use kube::api::{Api, DynamicObject};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use tracing::debug;

use crate::error::FetchError;

/* ============================= RESOURCE KINDS ============================= */

/// Group/version/kind plus plural, enough to address a resource dynamically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
}

impl ResourceKind {
    pub const POLICY: ResourceKind = ResourceKind {
        group: "policy.open-cluster-management.io",
        version: "v1",
        kind: "Policy",
        plural: "policies",
    };

    /// `<plural>.<group>`, the form `kubectl` accepts as a resource type.
    pub fn qualified_plural(&self) -> String {
        if self.group.is_empty() {
            self.plural.to_string()
        } else {
            format!("{}.{}", self.plural, self.group)
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        let api_version = if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        };
        ApiResource {
            group: self.group.to_string(),
            version: self.version.to_string(),
            api_version,
            kind: self.kind.to_string(),
            plural: self.plural.to_string(),
        }
    }
}

/* ============================= CLIENT ============================= */

/// Read-only access to a cluster's objects.
pub trait ClusterClient: Send + Sync {
    /// Fetch one namespaced object as raw JSON.
    fn get(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<serde_json::Value, FetchError>> + Send;
}

/// [`ClusterClient`] backed by a kube-rs client.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: kube::Client,
    label: String,
}

impl KubeClusterClient {
    pub fn new(client: kube::Client, label: impl Into<String>) -> Self {
        Self {
            client,
            label: label.into(),
        }
    }

    /// Build a client from an explicit kubeconfig file, or from the ambient
    /// configuration (`KUBECONFIG`, in-cluster) when `path` is `None`.
    pub async fn connect(path: Option<&Path>, label: &str) -> anyhow::Result<Self> {
        let client = match path {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).with_context(|| {
                    format!("Failed to read {label} kubeconfig at {}", path.display())
                })?;
                let config =
                    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .with_context(|| format!("Invalid {label} kubeconfig"))?;
                kube::Client::try_from(config)
                    .with_context(|| format!("Failed to build {label} client"))?
            }
            None => kube::Client::try_default()
                .await
                .with_context(|| format!("Failed to load default kubeconfig for {label}"))?,
        };
        Ok(Self::new(client, label))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn inner(&self) -> &kube::Client {
        &self.client
    }
}

impl ClusterClient for KubeClusterClient {
    async fn get(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<serde_json::Value, FetchError> {
        if name.is_empty() {
            return Err(FetchError::malformed(format!("empty {} name", kind.kind)));
        }

        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource());
        let obj = api.get(name).await?;

        debug!(
            cluster = %self.label,
            kind = kind.kind,
            name,
            namespace,
            "object_fetched"
        );

        serde_json::to_value(obj)
            .map_err(|e| FetchError::transient(format!("failed to encode {name}: {e}")))
    }
}

/* ============================= TESTS ============================= */
