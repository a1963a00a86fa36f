//! Template-sync error handling.
//!
//! Each case creates a policy whose template cannot be synced, checks the
//! noncompliant message, patches the template into shape, checks
//! compliance, then re-applies the broken manifest and checks that the
//! error comes back. Specs within a case run in order; once one fails the
//! rest are skipped, and the manifest is always deleted at the end.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::applier::ManifestApplier;
use crate::client::ClusterClient;
use crate::crd::ComplianceState;
use crate::predicate::Predicate;
use crate::suites::steps;
use crate::suites::{CaseReport, StepReport, StepStatus, SuiteContext, SuiteReport};

pub const SUITE_NAME: &str = "Test handling template-sync errors";

/* ============================= CASES ============================= */

#[derive(Debug, Clone, Copy)]
pub struct TemplateSyncCase {
    pub description: &'static str,
    /// Relative to the configured resources directory.
    pub manifest: &'static str,
    pub policy_name: &'static str,
    /// JSON pointer of the field whose replacement fixes the template.
    pub fix_path: &'static str,
    pub fix_value: &'static str,
    /// Message reported for the freshly created broken policy.
    pub broken_pattern: &'static str,
    /// Message reported once the broken manifest is re-applied over the fix.
    pub restored_pattern: &'static str,
    pub broken_spec: &'static str,
    pub fixed_spec: &'static str,
}

pub const NONEXISTENT_KIND: TemplateSyncCase = TemplateSyncCase {
    description: "Test using a template with a non-existent CRD",
    manifest: "template-sync-errors/pretend-policy-template.yaml",
    policy_name: "pretend-policy-template",
    fix_path: "/spec/policy-templates/0/objectDefinition/kind",
    fix_value: "ConfigurationPolicy",
    broken_pattern: ".*Mapping not found.*",
    restored_pattern: ".*Mapping not found.*",
    broken_spec: "Should be noncompliant with a mapping not found status",
    fixed_spec: "Should become compliant when the kind is fixed",
};

pub const INVALID_CR: TemplateSyncCase = TemplateSyncCase {
    description: "Test using a template with an invalid CR",
    manifest: "template-sync-errors/invalid-cr-template.yaml",
    policy_name: "invalid-cr-template",
    fix_path: "/spec/policy-templates/0/objectDefinition/spec/pruneObjectBehavior",
    fix_value: "None",
    broken_pattern: ".*Failed to create.*Unsupported value.*",
    restored_pattern: ".*Failed to update.*Unsupported value.*",
    broken_spec: "Should be noncompliant and report the reason the CR is invalid",
    fixed_spec: "Should become compliant when the spec is fixed",
};

pub const RESTORED_SPEC: &str = "Should become noncompliant when the original policy is restored";

pub fn cases() -> [TemplateSyncCase; 2] {
    [NONEXISTENT_KIND, INVALID_CR]
}

/* ============================= SPECS ============================= */

enum Action {
    Create,
    Fix,
    Restore,
    Compliance(ComplianceState),
    Message(Predicate<String>),
}

struct Spec {
    name: &'static str,
    actions: Vec<Action>,
}

impl TemplateSyncCase {
    fn specs(&self) -> Result<Vec<Spec>, regex::Error> {
        Ok(vec![
            Spec {
                name: self.broken_spec,
                actions: vec![
                    Action::Create,
                    Action::Compliance(ComplianceState::NonCompliant),
                    Action::Message(Predicate::matches_regex(self.broken_pattern)?),
                ],
            },
            Spec {
                name: self.fixed_spec,
                actions: vec![
                    Action::Fix,
                    Action::Compliance(ComplianceState::Compliant),
                    Action::Message(Predicate::not_matches_regex(self.broken_pattern)?),
                ],
            },
            Spec {
                name: RESTORED_SPEC,
                actions: vec![
                    Action::Restore,
                    Action::Compliance(ComplianceState::NonCompliant),
                    Action::Message(Predicate::matches_regex(self.restored_pattern)?),
                ],
            },
        ])
    }
}

/* ============================= RUNNER ============================= */

pub async fn run<C, A>(ctx: &SuiteContext<C, A>) -> SuiteReport
where
    C: ClusterClient + Clone,
    A: ManifestApplier,
{
    let mut report = SuiteReport {
        name: SUITE_NAME.to_string(),
        cases: Vec::new(),
    };
    for case in cases() {
        report.cases.push(run_case(ctx, &case).await);
    }
    report
}

pub async fn run_case<C, A>(ctx: &SuiteContext<C, A>, case: &TemplateSyncCase) -> CaseReport
where
    C: ClusterClient + Clone,
    A: ManifestApplier,
{
    let manifest = ctx.config.manifest(case.manifest);
    let mut report = CaseReport {
        description: case.description.to_string(),
        steps: Vec::new(),
        teardown_error: None,
    };

    info!(case = case.description, "case_start");

    match case.specs() {
        Ok(specs) => {
            let mut failed = false;
            for spec in specs {
                if failed || ctx.cancel.is_cancelled() {
                    report.steps.push(StepReport {
                        name: spec.name.to_string(),
                        status: StepStatus::Skipped,
                        elapsed: Default::default(),
                        finished_at: Utc::now(),
                    });
                    continue;
                }

                let started = Instant::now();
                let status = match run_spec(ctx, case, &manifest, &spec).await {
                    Ok(()) => StepStatus::Passed,
                    Err(e) => {
                        failed = true;
                        warn!(case = case.description, spec = spec.name, error = %format!("{e:#}"), "spec_failed");
                        StepStatus::Failed(format!("{e:#}"))
                    }
                };
                report.steps.push(StepReport {
                    name: spec.name.to_string(),
                    status,
                    elapsed: started.elapsed(),
                    finished_at: Utc::now(),
                });
            }
        }
        Err(e) => report.steps.push(StepReport {
            name: "compile status patterns".to_string(),
            status: StepStatus::Failed(e.to_string()),
            elapsed: Default::default(),
            finished_at: Utc::now(),
        }),
    }

    if let Err(e) = steps::delete_manifest(ctx, &manifest).await {
        warn!(case = case.description, error = %format!("{e:#}"), "teardown_failed");
        report.teardown_error = Some(format!("{e:#}"));
    }

    info!(case = case.description, passed = report.passed(), "case_finished");
    report
}

async fn run_spec<C, A>(
    ctx: &SuiteContext<C, A>,
    case: &TemplateSyncCase,
    manifest: &Path,
    spec: &Spec,
) -> Result<()>
where
    C: ClusterClient + Clone,
    A: ManifestApplier,
{
    info!(case = case.description, spec = spec.name, "spec_start");

    for action in &spec.actions {
        match action {
            Action::Create => steps::create_policy(ctx, manifest, case.policy_name).await?,
            Action::Fix => {
                steps::patch_policy(
                    ctx,
                    case.policy_name,
                    case.fix_path,
                    &serde_json::Value::from(case.fix_value),
                )
                .await?
            }
            Action::Restore => steps::apply_manifest(ctx, manifest).await?,
            Action::Compliance(expected) => {
                steps::root_compliance(ctx, case.policy_name, *expected).await?;
            }
            Action::Message(predicate) => {
                let message =
                    steps::latest_status_message(ctx, case.policy_name, 0, predicate).await?;
                info!(policy = case.policy_name, message = %message, "status_message_matched");
            }
        }
    }

    Ok(())
}

/* ============================= TESTS ============================= */
