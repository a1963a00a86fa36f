use std::path::PathBuf;

use clap::Args;

use crate::error::PollError;
use crate::poll::PollTiming;

pub const DEFAULT_USER_NAMESPACE: &str = "policy-test";
pub const DEFAULT_CLUSTER_NAMESPACE: &str = "local-cluster";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
pub const DEFAULT_INTERVAL_SECONDS: u64 = 1;

/// Shared, read-only settings handed explicitly to every suite step.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct E2eConfig {
    /// Kubeconfig for the hub cluster (defaults to the ambient kubeconfig)
    #[arg(long, env = "KUBECONFIG_HUB")]
    pub kubeconfig_hub: Option<PathBuf>,

    /// Kubeconfig for the managed cluster (defaults to the ambient kubeconfig)
    #[arg(long, env = "KUBECONFIG_MANAGED")]
    pub kubeconfig_managed: Option<PathBuf>,

    /// Namespace on the hub where test policies are created
    #[arg(long, env = "USER_NAMESPACE", default_value = DEFAULT_USER_NAMESPACE)]
    pub user_namespace: String,

    /// Namespace on the managed cluster holding replicated policies.
    ///
    /// The bundled manifests place policies on the cluster named
    /// `local-cluster` only; with any other value the replicas never
    /// appear and the suite times out unless the manifests are edited.
    #[arg(long, env = "CLUSTER_NAMESPACE", default_value = DEFAULT_CLUSTER_NAMESPACE)]
    pub cluster_namespace: String,

    /// Default timeout for eventual assertions
    #[arg(long, env = "DEFAULT_TIMEOUT_SECONDS", default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout_seconds: u64,

    /// Delay between polling attempts
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECONDS)]
    pub interval_seconds: u64,

    /// Directory containing the test manifests
    #[arg(long, env = "RESOURCES_DIR", default_value = "resources")]
    pub resources_dir: PathBuf,

    /// kubectl-compatible binary used for apply/patch/delete
    #[arg(long, env = "KUBECTL_BINARY", default_value = "kubectl")]
    pub kubectl: String,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            kubeconfig_hub: None,
            kubeconfig_managed: None,
            user_namespace: DEFAULT_USER_NAMESPACE.to_string(),
            cluster_namespace: DEFAULT_CLUSTER_NAMESPACE.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            resources_dir: PathBuf::from("resources"),
            kubectl: "kubectl".to_string(),
        }
    }
}

impl E2eConfig {
    pub fn timing(&self) -> Result<PollTiming, PollError> {
        PollTiming::from_secs(self.timeout_seconds, self.interval_seconds)
    }

    /// Name the propagator gives a root policy once replicated to a cluster.
    pub fn replicated_policy_name(&self, policy: &str) -> String {
        format!("{}.{}", self.user_namespace, policy)
    }

    pub fn manifest(&self, relative: &str) -> PathBuf {
        self.resources_dir.join(relative)
    }
}
