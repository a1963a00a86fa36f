use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::{Deserialize, Serialize};

/* ============================= SPEC ============================= */

/// Policy is the governance policy whose templates are synced to managed
/// clusters.
///
/// Only the fields the e2e suite reads or patches are typed; each template's
/// object definition is kept as raw JSON so that deliberately broken
/// templates (unknown kinds, invalid specs) still decode.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "policy.open-cluster-management.io",
    version = "v1",
    kind = "Policy",
    plural = "policies",
    shortname = "plc",
    status = "PolicyStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(default)]
    pub disabled: bool,

    /// `inform` or `enforce`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_action: Option<String>,

    #[serde(default, rename = "policy-templates")]
    pub policy_templates: Vec<PolicyTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTemplate {
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub object_definition: serde_json::Value,
}

fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        extensions: [(
            "x-kubernetes-preserve-unknown-fields".to_string(),
            serde_json::Value::Bool(true),
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    })
}

/* ============================= STATUS ============================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ComplianceState {
    Compliant,
    NonCompliant,
    Pending,
}

impl fmt::Display for ComplianceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compliant => "Compliant",
            Self::NonCompliant => "NonCompliant",
            Self::Pending => "Pending",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ComplianceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Compliant" => Ok(Self::Compliant),
            "NonCompliant" => Ok(Self::NonCompliant),
            "Pending" => Ok(Self::Pending),
            other => Err(format!(
                "unknown compliance state '{other}'. Expected: Compliant, NonCompliant, Pending"
            )),
        }
    }
}

/// Status written by the policy propagator (root policy on the hub) and by
/// the status-sync controller (replicated policy on the managed cluster).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<ComplianceState>,

    /// Per-cluster compliance, only set on root policies.
    #[serde(default, rename = "status", skip_serializing_if = "Vec::is_empty")]
    pub cluster_status: Vec<ClusterCompliance>,

    /// Per-template details, index-aligned with `spec.policy-templates`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<TemplateDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCompliance {
    #[serde(default)]
    pub clustername: String,

    #[serde(default)]
    pub clusternamespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<ComplianceState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<ComplianceState>,

    /// Newest entry first.
    #[serde(default)]
    pub history: Vec<ComplianceHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

/* ============================= TESTS ============================= */
