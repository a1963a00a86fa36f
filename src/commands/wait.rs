use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use grc_e2e::client::KubeClusterClient;
use grc_e2e::config::E2eConfig;
use grc_e2e::crd::ComplianceState;
use grc_e2e::predicate::Predicate;
use grc_e2e::query::{ComplianceQuery, StatusQuery, latest_status_messages};
use grc_e2e::poll::{poll_stream_until, poll_until};

/// Block until the replicated policy's latest template message matches (or,
/// with `negate`, stops matching) `pattern`.
pub async fn message(
    config: &E2eConfig,
    policy: &str,
    template_index: usize,
    pattern: &str,
    negate: bool,
) -> Result<()> {
    let predicate = if negate {
        Predicate::not_matches_regex(pattern)
    } else {
        Predicate::matches_regex(pattern)
    }
    .with_context(|| format!("Invalid regex '{pattern}'"))?;

    let timing = config.timing()?;
    let managed =
        KubeClusterClient::connect(config.kubeconfig_managed.as_deref(), "managed").await?;
    let query = StatusQuery::new(
        managed,
        config.replicated_policy_name(policy),
        config.cluster_namespace.as_str(),
        template_index,
    )?;
    let target = query.to_string();

    println!(
        "Waiting up to {}s for {target} to {}...",
        timing.timeout().as_secs(),
        predicate.description()
    );

    let cancel = cancel_on_ctrl_c();
    let message =
        poll_stream_until(&target, latest_status_messages(query), &predicate, timing, &cancel)
            .await?;

    info!(policy = %policy, message = %message, "wait_message_satisfied");
    println!("OK: {message}");
    Ok(())
}

/// Block until the root policy on the hub reports `state` for the configured
/// cluster namespace.
pub async fn compliance(config: &E2eConfig, policy: &str, state: ComplianceState) -> Result<()> {
    let timing = config.timing()?;
    let hub = KubeClusterClient::connect(config.kubeconfig_hub.as_deref(), "hub").await?;
    let query = ComplianceQuery::new(hub, policy, config.user_namespace.as_str())?
        .for_cluster(config.cluster_namespace.as_str())?;
    let target = query.to_string();

    println!(
        "Waiting up to {}s for {target} to be {state}...",
        timing.timeout().as_secs()
    );

    let cancel = cancel_on_ctrl_c();
    let observed = poll_until(
        &target,
        || query.compliance(),
        &Predicate::equals(state),
        timing,
        &cancel,
    )
    .await?;

    info!(policy = %policy, state = %observed, "wait_compliance_satisfied");
    println!("OK: {observed}");
    Ok(())
}

/// Token cancelled on the first Ctrl+C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("shutdown_signal_received");
            token.cancel();
        }
    });
    cancel
}
