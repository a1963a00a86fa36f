//! Ordered end-to-end suites and their reports.

pub mod steps;
pub mod template_sync;

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::E2eConfig;

/* ============================= CONTEXT ============================= */

/// Everything a suite step may touch, passed explicitly.
pub struct SuiteContext<C, A> {
    pub hub: C,
    pub managed: C,
    pub applier: A,
    pub config: E2eConfig,
    pub cancel: CancellationToken,
}

/* ============================= REPORTS ============================= */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    pub elapsed: Duration,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub description: String,
    pub steps: Vec<StepReport>,
    /// Error from the teardown step, if it failed.
    pub teardown_error: Option<String>,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.teardown_error.is_none()
            && self.steps.iter().all(|s| s.status == StepStatus::Passed)
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub name: String,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }

    fn count(&self, wanted: fn(&StepStatus) -> bool) -> usize {
        self.cases
            .iter()
            .flat_map(|c| &c.steps)
            .filter(|s| wanted(&s.status))
            .count()
    }

    pub fn passed_steps(&self) -> usize {
        self.count(|s| *s == StepStatus::Passed)
    }

    pub fn failed_steps(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Failed(_)))
    }

    pub fn skipped_steps(&self) -> usize {
        self.count(|s| *s == StepStatus::Skipped)
    }
}

/* ============================= TESTS ============================= */
