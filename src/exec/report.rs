// src/exec/report.rs

use std::fmt::Write as _;

use tracing::{error, info};

use crate::errors::{into_result, RepodagError};
use crate::model::TargetId;
use crate::types::RunnerStatus;

/// Outcome of one runner instance.
///
/// `runner` is `None` when the step failed before any instance existed
/// (runner construction error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerRecord {
    pub target: TargetId,
    pub step: usize,
    pub runner: Option<usize>,
    pub runner_id: Option<String>,
    pub status: RunnerStatus,
    pub error: Option<String>,
}

/// Records of a whole execution plus the errors behind failed records.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub records: Vec<RunnerRecord>,
    errors: Vec<RepodagError>,
}

impl ExecutionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: RunnerRecord) {
        self.records.push(record);
    }

    pub(crate) fn push_error(&mut self, err: RepodagError) {
        self.errors.push(err);
    }

    pub(crate) fn merge(&mut self, other: ExecutionReport) {
        self.records.extend(other.records);
        self.errors.extend(other.errors);
    }

    pub fn count(&self, status: RunnerStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Statuses recorded for `target`, in execution order.
    pub fn statuses_of(&self, target: &TargetId) -> Vec<RunnerStatus> {
        self.records
            .iter()
            .filter(|r| &r.target == target)
            .map(|r| r.status)
            .collect()
    }

    /// Targets in the order their first record was written.
    pub fn target_order(&self) -> Vec<&TargetId> {
        let mut order: Vec<&TargetId> = Vec::new();
        for record in &self.records {
            if !order.contains(&&record.target) {
                order.push(&record.target);
            }
        }
        order
    }

    /// Take the combined error of all failures, leaving the records.
    pub fn take_error(&mut self) -> Option<RepodagError> {
        into_result(std::mem::take(&mut self.errors)).err()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} runner(s): {} succeeded, {} failed, {} not run",
            self.records.len(),
            self.count(RunnerStatus::Success),
            self.count(RunnerStatus::Failed),
            self.count(RunnerStatus::NotRun)
        );
        for r in &self.records {
            let runner = r
                .runner
                .map(|i| i.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = write!(
                out,
                "  [{:>7}] {} step {} runner {}",
                r.status, r.target, r.step, runner
            );
            if let Some(id) = &r.runner_id {
                let _ = write!(out, " ({id})");
            }
            if let Some(err) = &r.error {
                let _ = write!(out, ": {err}");
            }
            out.push('\n');
        }
        out
    }

    pub fn log_summary(&self) {
        if self.has_failures() {
            error!("execution finished with failures\n{}", self.summary());
        } else {
            info!("execution finished\n{}", self.summary());
        }
    }
}
