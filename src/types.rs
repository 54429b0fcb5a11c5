use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the execution engine walks the priority list.
///
/// - `Sequential`: one worker iterates the priority sets in descending order.
/// - `Concurrent`: a bounded task flow; independent targets run in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sequential,
    Concurrent,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Sequential
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" | "serial" => Ok(ExecutionMode::Sequential),
            "concurrent" | "parallel" => Ok(ExecutionMode::Concurrent),
            other => Err(format!(
                "invalid execution mode: {other} (expected \"sequential\" or \"concurrent\")"
            )),
        }
    }
}

/// Final state of one runner instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    /// The runner never started (cancelled by an upstream failure).
    NotRun,
    Success,
    Failed,
}

impl std::fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunnerStatus::NotRun => "not-run",
            RunnerStatus::Success => "success",
            RunnerStatus::Failed => "failed",
        };
        f.pad(s)
    }
}
