// src/config/model.rs

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// What the executor does once a node fails terminally.
///
/// - `BestEffort`: keep scheduling every branch unaffected by the failure
///   (default).
/// - `FailFast`: stop dispatching new nodes; in-flight processes are allowed
///   to finish, then the run is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    BestEffort,
    FailFast,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::BestEffort
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best-effort" => Ok(FailurePolicy::BestEffort),
            "fail-fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"best-effort\" or \"fail-fast\")"
            )),
        }
    }
}

/// Engine tunables passed into the executor. No process-wide singletons:
/// everything the scheduler and executor need to know about capacity and
/// policy travels through this struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of execution slots in the resource pool.
    pub pool_capacity: usize,
    /// How many times a failed node is returned to the ready queue before
    /// failing terminally. Zero means a single attempt.
    pub retry_limit: u32,
    pub failure_policy: FailurePolicy,
    /// Per-process wall-clock limit, in seconds.
    pub task_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 4,
            retry_limit: 0,
            failure_policy: FailurePolicy::default(),
            task_timeout_secs: 3600,
        }
    }
}

impl EngineConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}
