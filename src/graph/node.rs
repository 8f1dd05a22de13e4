// src/graph/node.rs

//! Task nodes: one concrete instantiation of a rule, plus per-run state.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::cache::Fingerprint;

/// Identifier of a task node within its graph.
///
/// Ids are dense indices handed out in construction order, which is itself a
/// topological order of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Execution state of a task node.
///
/// `Pending -> Ready -> Running -> {Succeeded, Failed}`, with
/// `Failed -> Ready` while retries remain. `Skipped` is the non-executing
/// terminal state for nodes downstream of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting on at least one upstream dependency.
    Pending,
    /// All dependencies succeeded; eligible for dispatch.
    Ready,
    /// Dispatched; an external process is executing.
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Succeeded | NodeState::Failed | NodeState::Skipped
        )
    }
}

/// How a process-level execution attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    NonZeroExit(i32),
    TimedOut,
    SpawnFailed(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NonZeroExit(code) => write!(f, "exited with status {code}"),
            FailureKind::TimedOut => write!(f, "timed out"),
            FailureKind::SpawnFailed(detail) => write!(f, "failed to spawn: {detail}"),
        }
    }
}

/// Diagnostic detail captured from the last failed attempt of a node.
#[derive(Debug, Clone)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.stderr.is_empty() {
            write!(f, "; stderr: {}", self.stderr.trim_end())?;
        }
        Ok(())
    }
}

/// A single task node.
///
/// Input, derived output, instruction and fingerprint are all fixed at graph
/// construction time; only `state`, `attempts` and `last_failure` mutate
/// during a run, and only from the executor's single control loop.
#[derive(Debug)]
pub struct TaskNode {
    pub id: NodeId,
    /// Name of the owning rule.
    pub rule: String,
    pub input: Value,
    pub output: Value,
    pub instruction: String,
    pub fingerprint: Fingerprint,
    /// Upstream nodes whose output feeds this node's input.
    pub deps: Vec<NodeId>,
    /// Downstream nodes consuming this node's output.
    pub dependents: Vec<NodeId>,
    pub state: NodeState,
    /// Number of failed execution attempts so far.
    pub attempts: u32,
    pub last_failure: Option<FailureDetail>,
}

/// Description of a node the executor wants a backend to run now.
#[derive(Debug, Clone)]
pub struct DispatchedNode {
    pub id: NodeId,
    pub rule: String,
    pub instruction: String,
    pub timeout: Duration,
}

impl DispatchedNode {
    pub(crate) fn from_node(node: &TaskNode, timeout: Duration) -> Self {
        Self {
            id: node.id,
            rule: node.rule.clone(),
            instruction: node.instruction.clone(),
            timeout,
        }
    }
}
