use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use grc_e2e::applier::{ManifestApplier, PatchType};
use grc_e2e::client::{ClusterClient, ResourceKind};
use grc_e2e::config::E2eConfig;
use grc_e2e::crd::ComplianceState;
use grc_e2e::error::{ApplyError, FetchError};
use serde_json::{Value, json};

/* ============================= FAKE CLUSTER ============================= */

struct PendingWrite {
    reads_left: u32,
    key: (String, String),
    value: Option<Value>,
}

#[derive(Default)]
struct ClusterState {
    objects: HashMap<(String, String), Value>,
    pending: Vec<PendingWrite>,
    injected: VecDeque<FetchError>,
    read_lag: u32,
    gets: u32,
}

/// In-memory policy store. Writes become visible only after `read_lag`
/// further reads, imitating a controller that reconciles asynchronously.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

#[allow(dead_code)]
impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_lag(read_lag: u32) -> Self {
        let cluster = Self::default();
        cluster.state.lock().unwrap().read_lag = read_lag;
        cluster
    }

    pub fn put(&self, namespace: &str, name: &str, value: Value) {
        self.write(namespace, name, Some(value));
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        self.write(namespace, name, None);
    }

    /// Fail the next read with `err`, ahead of any object lookup.
    pub fn fail_next(&self, err: FetchError) {
        self.state.lock().unwrap().injected.push_back(err);
    }

    pub fn gets(&self) -> u32 {
        self.state.lock().unwrap().gets
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        let key = (namespace.to_string(), name.to_string());
        self.state.lock().unwrap().objects.contains_key(&key)
    }

    fn write(&self, namespace: &str, name: &str, value: Option<Value>) {
        let mut state = self.state.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        if state.read_lag == 0 {
            apply_write(&mut state.objects, key, value);
        } else {
            let reads_left = state.read_lag;
            state.pending.push(PendingWrite {
                reads_left,
                key,
                value,
            });
        }
    }
}

fn apply_write(objects: &mut HashMap<(String, String), Value>, key: (String, String), value: Option<Value>) {
    match value {
        Some(v) => {
            objects.insert(key, v);
        }
        None => {
            objects.remove(&key);
        }
    }
}

impl ClusterClient for FakeCluster {
    fn get(
        &self,
        _kind: &ResourceKind,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<Value, FetchError>> + Send {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.gets += 1;

            let mut ready = Vec::new();
            state.pending.retain_mut(|w| {
                w.reads_left -= 1;
                if w.reads_left == 0 {
                    ready.push((w.key.clone(), w.value.take()));
                    false
                } else {
                    true
                }
            });
            for (key, value) in ready {
                apply_write(&mut state.objects, key, value);
            }

            match state.injected.pop_front() {
                Some(err) => Err(err),
                None => state
                    .objects
                    .get(&(namespace.to_string(), name.to_string()))
                    .cloned()
                    .ok_or_else(|| {
                        FetchError::not_found(format!("policies \"{name}\" not found"))
                    }),
            }
        };
        async move { result }
    }
}

/* ============================= POLICY OBJECTS ============================= */

#[allow(dead_code)]
pub fn policy_object(
    name: &str,
    namespace: &str,
    compliant: ComplianceState,
    message: Option<&str>,
) -> Value {
    let details = match message {
        Some(m) => json!([{ "compliant": compliant, "history": [{ "message": m }] }]),
        None => json!([]),
    };
    json!({
        "apiVersion": "policy.open-cluster-management.io/v1",
        "kind": "Policy",
        "metadata": { "name": name, "namespace": namespace },
        "spec": { "remediationAction": "inform", "policy-templates": [] },
        "status": { "compliant": compliant, "details": details }
    })
}

/// Root policy as the propagator reports it when placed on
/// `cluster_namespace` and on a second cluster that stays NonCompliant, so
/// the aggregate `status.compliant` never follows the cluster under test.
#[allow(dead_code)]
pub fn root_policy_object(
    name: &str,
    namespace: &str,
    cluster_namespace: &str,
    compliant: ComplianceState,
) -> Value {
    json!({
        "apiVersion": "policy.open-cluster-management.io/v1",
        "kind": "Policy",
        "metadata": { "name": name, "namespace": namespace },
        "spec": { "remediationAction": "inform", "policy-templates": [] },
        "status": {
            "compliant": ComplianceState::NonCompliant,
            "status": [
                { "clustername": "edge-1", "clusternamespace": "edge-1", "compliant": ComplianceState::NonCompliant },
                { "clustername": cluster_namespace, "clusternamespace": cluster_namespace, "compliant": compliant }
            ]
        }
    })
}

/* ============================= FAKE CONTROLLER ============================= */

/// How the simulated propagator and template-sync controller react to one
/// manifest.
#[derive(Clone)]
#[allow(dead_code)]
pub struct ControllerBehavior {
    pub policy_name: &'static str,
    pub created_message: &'static str,
    /// `None` means the fix patch is accepted but never reconciled.
    pub fixed_message: Option<&'static str>,
    pub restored_message: &'static str,
}

#[allow(dead_code)]
pub const PRETEND_CREATED: &str = "NonCompliant; template-error; Mapping not found, check if you have the CRD deployed: no matches for kind \"PretendPolicy\" in version \"policy.open-cluster-management.io/v1\"";
#[allow(dead_code)]
pub const PRETEND_FIXED: &str = "Compliant; notification - configmaps [pretend-policy-template] found as specified in namespace default";
#[allow(dead_code)]
pub const INVALID_CREATED: &str = "NonCompliant; template-error; Failed to create policy template: ConfigurationPolicy.policy.open-cluster-management.io \"invalid-cr-template\" is invalid: spec.pruneObjectBehavior: Unsupported value: \"NotARealValue\": supported values: \"DeleteAll\", \"DeleteIfCreated\", \"None\"";
#[allow(dead_code)]
pub const INVALID_FIXED: &str = "Compliant; notification - configmaps [invalid-cr-template] not found in namespace default";
#[allow(dead_code)]
pub const INVALID_RESTORED: &str = "NonCompliant; template-error; Failed to update policy template: ConfigurationPolicy.policy.open-cluster-management.io \"invalid-cr-template\" is invalid: spec.pruneObjectBehavior: Unsupported value: \"NotARealValue\": supported values: \"DeleteAll\", \"DeleteIfCreated\", \"None\"";

#[allow(dead_code)]
pub fn default_behaviors() -> HashMap<&'static str, ControllerBehavior> {
    HashMap::from([
        (
            "pretend-policy-template.yaml",
            ControllerBehavior {
                policy_name: "pretend-policy-template",
                created_message: PRETEND_CREATED,
                fixed_message: Some(PRETEND_FIXED),
                restored_message: PRETEND_CREATED,
            },
        ),
        (
            "invalid-cr-template.yaml",
            ControllerBehavior {
                policy_name: "invalid-cr-template",
                created_message: INVALID_CREATED,
                fixed_message: Some(INVALID_FIXED),
                restored_message: INVALID_RESTORED,
            },
        ),
    ])
}

/// [`ManifestApplier`] that records every call and updates the fake hub and
/// managed clusters the way the real controllers would.
#[derive(Clone)]
#[allow(dead_code)]
pub struct FakeApplier {
    hub: FakeCluster,
    managed: FakeCluster,
    cluster_namespace: String,
    behaviors: Arc<HashMap<&'static str, ControllerBehavior>>,
    applied: Arc<Mutex<HashSet<String>>>,
    log: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl FakeApplier {
    pub fn new(
        hub: FakeCluster,
        managed: FakeCluster,
        config: &E2eConfig,
        behaviors: HashMap<&'static str, ControllerBehavior>,
    ) -> Self {
        Self {
            hub,
            managed,
            cluster_namespace: config.cluster_namespace.clone(),
            behaviors: Arc::new(behaviors),
            applied: Arc::default(),
            log: Arc::default(),
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn behavior(&self, file: &str) -> Result<ControllerBehavior, ApplyError> {
        self.behaviors
            .get(file)
            .cloned()
            .ok_or_else(|| ApplyError::CommandFailed {
                command: format!("kubectl apply -f {file}"),
                status: "exit status: 1".to_string(),
                stderr: format!("error: the path \"{file}\" does not exist"),
            })
    }

    fn publish(&self, user_ns: &str, name: &str, state: ComplianceState, message: &str) {
        self.hub.put(
            user_ns,
            name,
            root_policy_object(name, user_ns, &self.cluster_namespace, state),
        );
        let replica = format!("{user_ns}.{name}");
        self.managed.put(
            &self.cluster_namespace,
            &replica,
            policy_object(&replica, &self.cluster_namespace, state, Some(message)),
        );
    }
}

impl ManifestApplier for FakeApplier {
    async fn apply(&self, path: &Path, namespace: &str) -> Result<(), ApplyError> {
        let file = Self::file_name(path);
        self.log
            .lock()
            .unwrap()
            .push(format!("apply {file} -n {namespace}"));

        let behavior = self.behavior(&file)?;
        let first = self.applied.lock().unwrap().insert(file);
        let message = if first {
            behavior.created_message
        } else {
            behavior.restored_message
        };
        self.publish(
            namespace,
            behavior.policy_name,
            ComplianceState::NonCompliant,
            message,
        );
        Ok(())
    }

    async fn patch(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
        patch_type: PatchType,
        body: &str,
    ) -> Result<(), ApplyError> {
        self.log.lock().unwrap().push(format!(
            "patch {kind} {name} -n {namespace} --type={patch_type} -p {body}"
        ));

        let behavior = self
            .behaviors
            .values()
            .find(|b| b.policy_name == name)
            .cloned();
        if let Some(fixed) = behavior.and_then(|b| b.fixed_message) {
            self.publish(namespace, name, ComplianceState::Compliant, fixed);
        }
        Ok(())
    }

    async fn delete(&self, path: &Path, namespace: &str) -> Result<(), ApplyError> {
        let file = Self::file_name(path);
        self.log
            .lock()
            .unwrap()
            .push(format!("delete {file} -n {namespace}"));

        if let Ok(behavior) = self.behavior(&file) {
            self.hub.remove(namespace, behavior.policy_name);
            self.managed.remove(
                &self.cluster_namespace,
                &format!("{namespace}.{}", behavior.policy_name),
            );
        }
        Ok(())
    }
}

/* ============================= CONFIG ============================= */

/// Short timings so failure paths stay quick under paused time.
#[allow(dead_code)]
pub fn test_config() -> E2eConfig {
    E2eConfig {
        timeout_seconds: 10,
        interval_seconds: 1,
        resources_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources"),
        ..Default::default()
    }
}
