//! Read-only status queries against root and replicated policies.

use std::fmt;

use futures::{Stream, stream};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{ClusterClient, ResourceKind};
use crate::crd::{ClusterCompliance, ComplianceState};
use crate::error::FetchError;

/* ============================= STATUS QUERY ============================= */

/// Identifies one template's status on one policy, plus the client to read
/// it through.
#[derive(Clone)]
pub struct StatusQuery<C> {
    client: C,
    name: String,
    namespace: String,
    template_index: usize,
}

impl<C: ClusterClient> StatusQuery<C> {
    pub fn new(
        client: C,
        name: impl Into<String>,
        namespace: impl Into<String>,
        template_index: usize,
    ) -> Result<Self, FetchError> {
        let name = name.into();
        let namespace = namespace.into();
        validate_identity(&name, &namespace)?;
        Ok(Self {
            client,
            name,
            namespace,
            template_index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn template_index(&self) -> usize {
        self.template_index
    }

    /// One fetch of `status.details[index].history[0].message`.
    ///
    /// Only that path is read, so unrelated status fields in shapes this
    /// crate does not model never block the message.
    pub async fn latest_message(&self) -> Result<String, FetchError> {
        let status = fetch_status(&self.client, &self.name, &self.namespace).await?;
        let pointer = format!("/details/{}/history/0/message", self.template_index);
        match status.pointer(&pointer) {
            Some(Value::String(message)) => Ok(message.clone()),
            None | Some(Value::Null) => Err(FetchError::not_found(format!(
                "no status message yet for template {} of {}",
                self.template_index, self
            ))),
            Some(other) => Err(FetchError::transient(format!(
                "status message of {self} is not a string: {other}"
            ))),
        }
    }
}

impl<C> fmt::Display for StatusQuery<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "policy {}/{} template {}",
            self.namespace, self.name, self.template_index
        )
    }
}

/// Infinite stream of latest status messages; every advance is one fetch.
pub fn latest_status_messages<C>(
    query: StatusQuery<C>,
) -> impl Stream<Item = Result<String, FetchError>>
where
    C: ClusterClient,
{
    stream::unfold(query, |query| async move {
        let message = query.latest_message().await;
        Some((message, query))
    })
}

/* ============================= COMPLIANCE QUERY ============================= */

/// Identifies a policy whose compliance is of interest.
///
/// By default the overall `status.compliant` is read. Scoped with
/// [`ComplianceQuery::for_cluster`], the root policy's `status.status[]`
/// entry for that cluster namespace is read instead.
#[derive(Clone)]
pub struct ComplianceQuery<C> {
    client: C,
    name: String,
    namespace: String,
    cluster_namespace: Option<String>,
}

impl<C: ClusterClient> ComplianceQuery<C> {
    pub fn new(
        client: C,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let name = name.into();
        let namespace = namespace.into();
        validate_identity(&name, &namespace)?;
        Ok(Self {
            client,
            name,
            namespace,
            cluster_namespace: None,
        })
    }

    /// Read the compliance the root policy reports for one managed cluster.
    pub fn for_cluster(mut self, cluster_namespace: impl Into<String>) -> Result<Self, FetchError> {
        let cluster_namespace = cluster_namespace.into();
        if cluster_namespace.trim().is_empty() {
            return Err(FetchError::malformed(format!(
                "cluster namespace for policy '{}' must not be empty",
                self.name
            )));
        }
        self.cluster_namespace = Some(cluster_namespace);
        Ok(self)
    }

    pub async fn compliance(&self) -> Result<ComplianceState, FetchError> {
        let mut status = fetch_status(&self.client, &self.name, &self.namespace).await?;
        let state = match &self.cluster_namespace {
            None => match status.get_mut("compliant").map(Value::take) {
                None | Some(Value::Null) => None,
                Some(state) => Some(decode(state, self)?),
            },
            Some(cluster) => {
                let entry = cluster_entry(&mut status, cluster).ok_or_else(|| {
                    FetchError::not_found(format!("{self} has no status entry yet"))
                })?;
                decode::<ClusterCompliance>(entry, self)?.compliant
            }
        };
        state.ok_or_else(|| FetchError::not_found(format!("no compliance state yet for {self}")))
    }

    /// Whether the policy object exists at all, regardless of status.
    pub async fn exists(&self) -> Result<(), FetchError> {
        self.client
            .get(&ResourceKind::POLICY, &self.name, &self.namespace)
            .await
            .map(|_| ())
    }
}

impl<C> fmt::Display for ComplianceQuery<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy {}/{}", self.namespace, self.name)?;
        if let Some(cluster) = &self.cluster_namespace {
            write!(f, " on cluster {cluster}")?;
        }
        Ok(())
    }
}

/* ============================= HELPERS ============================= */

fn validate_identity(name: &str, namespace: &str) -> Result<(), FetchError> {
    if name.trim().is_empty() {
        return Err(FetchError::malformed("policy name must not be empty"));
    }
    if namespace.trim().is_empty() {
        return Err(FetchError::malformed(format!(
            "namespace for policy '{name}' must not be empty"
        )));
    }
    Ok(())
}

/// The raw `status` of a policy, left undecoded so each query reads only
/// the fields it needs.
async fn fetch_status<C: ClusterClient>(
    client: &C,
    name: &str,
    namespace: &str,
) -> Result<Value, FetchError> {
    let mut obj = client.get(&ResourceKind::POLICY, name, namespace).await?;
    match obj.get_mut("status").map(Value::take) {
        None | Some(Value::Null) => Err(FetchError::not_found(format!(
            "policy {namespace}/{name} has no status yet"
        ))),
        Some(status) => Ok(status),
    }
}

/// Takes the `status.status[]` entry whose `clusternamespace` matches.
fn cluster_entry(status: &mut Value, cluster_namespace: &str) -> Option<Value> {
    status
        .get_mut("status")?
        .as_array_mut()?
        .iter_mut()
        .find(|e| e.get("clusternamespace").and_then(Value::as_str) == Some(cluster_namespace))
        .map(Value::take)
}

fn decode<T: DeserializeOwned>(value: Value, what: impl fmt::Display) -> Result<T, FetchError> {
    serde_json::from_value(value)
        .map_err(|e| FetchError::transient(format!("undecodable status on {what}: {e}")))
}

/* ============================= TESTS ============================= */
