//! Reusable test steps: create a policy, wait on compliance, wait on a
//! template status message.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::applier::{ManifestApplier, PatchType, json_patch_replace};
use crate::client::{ClusterClient, ResourceKind};
use crate::crd::ComplianceState;
use crate::poll::{poll_stream_until, poll_until};
use crate::predicate::Predicate;
use crate::query::{ComplianceQuery, StatusQuery, latest_status_messages};
use crate::suites::SuiteContext;

/// Apply `manifest` on the hub and wait until the root policy exists there
/// and its replica exists on the managed cluster.
pub async fn create_policy<C, A>(ctx: &SuiteContext<C, A>, manifest: &Path, name: &str) -> Result<()>
where
    C: ClusterClient + Clone,
    A: ManifestApplier,
{
    let ns = &ctx.config.user_namespace;
    ctx.applier
        .apply(manifest, ns)
        .await
        .with_context(|| format!("Failed to apply {}", manifest.display()))?;

    let timing = ctx.config.timing()?;

    let root = ComplianceQuery::new(ctx.hub.clone(), name, ns.as_str())?;
    poll_until(
        &root.to_string(),
        || root.exists(),
        &Predicate::exists(),
        timing,
        &ctx.cancel,
    )
    .await
    .context("Root policy was not created on the hub")?;

    let replica = ComplianceQuery::new(
        ctx.managed.clone(),
        ctx.config.replicated_policy_name(name),
        ctx.config.cluster_namespace.as_str(),
    )?;
    poll_until(
        &replica.to_string(),
        || replica.exists(),
        &Predicate::exists(),
        timing,
        &ctx.cancel,
    )
    .await
    .context("Policy was not replicated to the managed cluster")?;

    info!(policy = %name, "policy_created");
    Ok(())
}

/// Wait for the root policy on the hub to report `expected` for the managed
/// cluster under test.
pub async fn root_compliance<C, A>(
    ctx: &SuiteContext<C, A>,
    name: &str,
    expected: ComplianceState,
) -> Result<ComplianceState>
where
    C: ClusterClient + Clone,
    A: ManifestApplier,
{
    let query = ComplianceQuery::new(ctx.hub.clone(), name, ctx.config.user_namespace.as_str())?
        .for_cluster(ctx.config.cluster_namespace.as_str())?;
    let state = poll_until(
        &query.to_string(),
        || query.compliance(),
        &Predicate::equals(expected),
        ctx.config.timing()?,
        &ctx.cancel,
    )
    .await?;
    Ok(state)
}

/// Wait for the newest history message of the replicated policy's template
/// at `template_index` to satisfy `predicate`.
pub async fn latest_status_message<C, A>(
    ctx: &SuiteContext<C, A>,
    name: &str,
    template_index: usize,
    predicate: &Predicate<String>,
) -> Result<String>
where
    C: ClusterClient + Clone,
    A: ManifestApplier,
{
    let query = StatusQuery::new(
        ctx.managed.clone(),
        ctx.config.replicated_policy_name(name),
        ctx.config.cluster_namespace.as_str(),
        template_index,
    )?;
    let target = query.to_string();
    let message = poll_stream_until(
        &target,
        latest_status_messages(query),
        predicate,
        ctx.config.timing()?,
        &ctx.cancel,
    )
    .await?;
    Ok(message)
}

/// JSON-patch a single field of the root policy on the hub.
pub async fn patch_policy<C, A>(
    ctx: &SuiteContext<C, A>,
    name: &str,
    path: &str,
    value: &serde_json::Value,
) -> Result<()>
where
    C: ClusterClient + Clone,
    A: ManifestApplier,
{
    let body = json_patch_replace(path, value);
    ctx.applier
        .patch(
            &ResourceKind::POLICY.qualified_plural(),
            name,
            &ctx.config.user_namespace,
            PatchType::Json,
            &body,
        )
        .await
        .with_context(|| format!("Failed to patch {path} on policy {name}"))?;
    Ok(())
}

pub async fn apply_manifest<C, A>(ctx: &SuiteContext<C, A>, manifest: &Path) -> Result<()>
where
    C: ClusterClient + Clone,
    A: ManifestApplier,
{
    ctx.applier
        .apply(manifest, &ctx.config.user_namespace)
        .await
        .with_context(|| format!("Failed to apply {}", manifest.display()))
}

pub async fn delete_manifest<C, A>(ctx: &SuiteContext<C, A>, manifest: &Path) -> Result<()>
where
    C: ClusterClient + Clone,
    A: ManifestApplier,
{
    ctx.applier
        .delete(manifest, &ctx.config.user_namespace)
        .await
        .with_context(|| format!("Failed to delete {}", manifest.display()))
}
