mod common;

use common::{
    FakeApplier, FakeCluster, INVALID_CREATED, PRETEND_CREATED, default_behaviors, test_config,
};
use grc_e2e::applier::{ManifestApplier, PatchType};
use grc_e2e::crd::ComplianceState;
use grc_e2e::error::FetchError;
use grc_e2e::predicate::Predicate;
use grc_e2e::suites::template_sync::{self, INVALID_CR, NONEXISTENT_KIND, RESTORED_SPEC};
use grc_e2e::suites::{StepStatus, SuiteContext, steps};
use tokio_util::sync::CancellationToken;

// ══════════════════════════════════════════════════════════════════
// Template-sync suite against simulated hub and managed clusters
//
// The fake applier plays the propagator and template-sync controller:
// applying a broken manifest publishes a NonCompliant status with the
// controller's error message, the fix patch publishes Compliant, and
// re-applying publishes the "restored" error.
// ══════════════════════════════════════════════════════════════════

fn context(read_lag: u32) -> (SuiteContext<FakeCluster, FakeApplier>, FakeCluster, FakeApplier) {
    let config = test_config();
    let hub = FakeCluster::with_read_lag(read_lag);
    let managed = FakeCluster::with_read_lag(read_lag);
    let applier = FakeApplier::new(hub.clone(), managed.clone(), &config, default_behaviors());
    let ctx = SuiteContext {
        hub,
        managed: managed.clone(),
        applier: applier.clone(),
        config,
        cancel: CancellationToken::new(),
    };
    (ctx, managed, applier)
}

#[tokio::test(start_paused = true)]
async fn test_full_suite_passes() {
    let (ctx, managed, applier) = context(0);

    let report = template_sync::run(&ctx).await;

    assert!(report.passed(), "{report:#?}");
    assert_eq!(report.cases.len(), 2);
    assert_eq!(report.passed_steps(), 6);
    assert_eq!(report.cases[0].description, NONEXISTENT_KIND.description);
    assert_eq!(report.cases[1].steps[2].name, RESTORED_SPEC);

    // Teardown removed the replicas.
    assert!(!managed.contains("local-cluster", "policy-test.pretend-policy-template"));
    assert!(!managed.contains("local-cluster", "policy-test.invalid-cr-template"));

    let log = applier.log();
    assert_eq!(log.len(), 8);
    assert_eq!(log[0], "apply pretend-policy-template.yaml -n policy-test");
    assert!(log[1].starts_with(
        "patch policies.policy.open-cluster-management.io pretend-policy-template -n policy-test --type=json"
    ));
    assert!(log[1].contains("/spec/policy-templates/0/objectDefinition/kind"));
    assert!(log[1].contains("ConfigurationPolicy"));
    assert_eq!(log[2], "apply pretend-policy-template.yaml -n policy-test");
    assert_eq!(log[3], "delete pretend-policy-template.yaml -n policy-test");
    assert!(log[5].contains("/spec/policy-templates/0/objectDefinition/spec/pruneObjectBehavior"));
    assert_eq!(log[7], "delete invalid-cr-template.yaml -n policy-test");
}

#[tokio::test(start_paused = true)]
async fn test_suite_tolerates_reconcile_lag() {
    let (ctx, _managed, _applier) = context(3);

    let report = template_sync::run(&ctx).await;

    assert!(report.passed(), "{report:#?}");
}

#[tokio::test(start_paused = true)]
async fn test_suite_tolerates_transient_fetch_errors() {
    let (ctx, managed, _applier) = context(0);
    for _ in 0..3 {
        managed.fail_next(FetchError::transient("http2 connection closed"));
    }

    let report = template_sync::run(&ctx).await;

    assert!(report.passed(), "{report:#?}");
}

#[tokio::test(start_paused = true)]
async fn test_unreconciled_fix_fails_and_skips_remaining_specs() {
    let config = test_config();
    let hub = FakeCluster::new();
    let managed = FakeCluster::new();
    let mut behaviors = default_behaviors();
    if let Some(b) = behaviors.get_mut("pretend-policy-template.yaml") {
        b.fixed_message = None;
    }
    let applier = FakeApplier::new(hub.clone(), managed.clone(), &config, behaviors);
    let ctx = SuiteContext {
        hub,
        managed,
        applier: applier.clone(),
        config,
        cancel: CancellationToken::new(),
    };

    let case = template_sync::run_case(&ctx, &NONEXISTENT_KIND).await;

    assert!(!case.passed());
    assert_eq!(case.steps[0].status, StepStatus::Passed);
    match &case.steps[1].status {
        StepStatus::Failed(reason) => {
            assert!(reason.contains("timed out"), "{reason}");
            assert!(reason.contains("Compliant"), "{reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(case.steps[2].status, StepStatus::Skipped);

    // Teardown still ran.
    assert_eq!(
        applier.log().last().map(String::as_str),
        Some("delete pretend-policy-template.yaml -n policy-test")
    );

    // The other case is unaffected.
    let other = template_sync::run_case(&ctx, &INVALID_CR).await;
    assert!(other.passed(), "{other:#?}");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_suite_skips_specs_but_tears_down() {
    let (ctx, _managed, applier) = context(0);
    ctx.cancel.cancel();

    let report = template_sync::run(&ctx).await;

    assert!(!report.passed());
    assert_eq!(report.skipped_steps(), 6);
    assert_eq!(
        applier.log(),
        vec![
            "delete pretend-policy-template.yaml -n policy-test",
            "delete invalid-cr-template.yaml -n policy-test",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_steps_observe_controller_messages() {
    let (ctx, _managed, _applier) = context(0);
    let manifest = ctx.config.manifest(INVALID_CR.manifest);

    steps::create_policy(&ctx, &manifest, INVALID_CR.policy_name)
        .await
        .unwrap();

    let state = steps::root_compliance(&ctx, INVALID_CR.policy_name, ComplianceState::NonCompliant)
        .await
        .unwrap();
    assert_eq!(state, ComplianceState::NonCompliant);

    let message = steps::latest_status_message(
        &ctx,
        INVALID_CR.policy_name,
        0,
        &Predicate::matches_regex(INVALID_CR.broken_pattern).unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(message, INVALID_CREATED);

    // Pretend policy was never applied, so waiting on it times out.
    let err = steps::latest_status_message(
        &ctx,
        NONEXISTENT_KIND.policy_name,
        0,
        &Predicate::matches_regex(NONEXISTENT_KIND.broken_pattern).unwrap(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("timed out"));
    assert!(!err.to_string().contains(PRETEND_CREATED));
}

#[tokio::test(start_paused = true)]
async fn test_root_compliance_follows_cluster_entry_not_aggregate() {
    let (ctx, _managed, applier) = context(0);
    let manifest = ctx.config.manifest(NONEXISTENT_KIND.manifest);

    steps::create_policy(&ctx, &manifest, NONEXISTENT_KIND.policy_name)
        .await
        .unwrap();
    applier
        .patch("policies", NONEXISTENT_KIND.policy_name, "policy-test", PatchType::Json, "[]")
        .await
        .unwrap();

    // The aggregate stays NonCompliant because another placed cluster is
    // still failing; local-cluster's own entry is Compliant.
    let state = steps::root_compliance(&ctx, NONEXISTENT_KIND.policy_name, ComplianceState::Compliant)
        .await
        .unwrap();
    assert_eq!(state, ComplianceState::Compliant);
}
