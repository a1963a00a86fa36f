use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use grc_e2e::applier::CliApplier;
use grc_e2e::client::KubeClusterClient;
use grc_e2e::config::E2eConfig;
use grc_e2e::suites::{StepStatus, SuiteContext, SuiteReport, template_sync};

use super::wait::cancel_on_ctrl_c;

pub async fn template_sync_errors(config: E2eConfig, suite_timeout: Option<u64>) -> Result<()> {
    println!("Starting template-sync error suite...\n");

    // Reject bad timing before touching any cluster
    config.timing()?;

    let hub = KubeClusterClient::connect(config.kubeconfig_hub.as_deref(), "hub").await?;
    let managed =
        KubeClusterClient::connect(config.kubeconfig_managed.as_deref(), "managed").await?;

    for (line, client) in [
        ("  Hub connection .............. ", &hub),
        ("  Managed connection .......... ", &managed),
    ] {
        print!("{line}");
        match client.inner().apiserver_version().await {
            Ok(v) => println!("OK (v{}.{})", v.major, v.minor),
            Err(e) => {
                println!("FAIL");
                anyhow::bail!(
                    "Cannot reach {} cluster: {}. Is the cluster running?",
                    client.label(),
                    e
                );
            }
        }
    }

    println!("  User namespace .............. {}", config.user_namespace);
    println!("  Cluster namespace ........... {}", config.cluster_namespace);
    println!(
        "  Assertion timeout ........... {}s (every {}s)",
        config.timeout_seconds, config.interval_seconds
    );
    println!("\n{}", "=".repeat(70));

    let cancel = cancel_on_ctrl_c();
    if let Some(secs) = suite_timeout {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(suite_timeout_secs = secs, "suite_timeout_reached");
            token.cancel();
        });
    }

    let applier = CliApplier::new(config.kubectl.clone(), config.kubeconfig_hub.clone());
    let ctx = SuiteContext {
        hub,
        managed,
        applier,
        config,
        cancel,
    };

    info!(suite = template_sync::SUITE_NAME, "suite_start");
    let report = template_sync::run(&ctx).await;
    print_report(&report);

    if !report.passed() {
        anyhow::bail!(
            "{} failed: {} failed, {} skipped",
            report.name,
            report.failed_steps(),
            report.skipped_steps()
        );
    }
    Ok(())
}

fn print_report(report: &SuiteReport) {
    println!("{}", report.name);
    for case in &report.cases {
        println!("\n  {}", case.description);
        for step in &case.steps {
            let timestamp = step.finished_at.format("%H:%M:%S");
            match &step.status {
                StepStatus::Passed => println!(
                    "  [{timestamp}] PASS  {} ({:.1}s)",
                    step.name,
                    step.elapsed.as_secs_f64()
                ),
                StepStatus::Failed(reason) => {
                    println!("  [{timestamp}] FAIL  {}", step.name);
                    println!("             {reason}");
                }
                StepStatus::Skipped => println!("  [{timestamp}] SKIP  {}", step.name),
            }
        }
        if let Some(err) = &case.teardown_error {
            println!("  Teardown failed: {err}");
        }
    }

    println!("\n{}", "=".repeat(70));
    println!(
        "{} passed, {} failed, {} skipped",
        report.passed_steps(),
        report.failed_steps(),
        report.skipped_steps()
    );
}
