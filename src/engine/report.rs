// src/engine/report.rs

//! The terminal artifact of a run: per-node outcomes.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::graph::node::{FailureDetail, NodeId, NodeState};
use crate::graph::TaskGraph;

/// Terminal state of a node as presented to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Succeeded,
    Failed,
    Skipped,
}

/// Outcome of one task node.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub rule: String,
    pub state: TerminalState,
    /// Output value, present for succeeded nodes.
    pub output: Option<Value>,
    /// Diagnostic detail from the last attempt, present for failed nodes.
    pub failure: Option<FailureDetail>,
}

/// Mapping from task identifier to terminal state, output and failure
/// detail, sufficient for a surrounding tool to render logs or exit codes.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    entries: BTreeMap<NodeId, NodeReport>,
}

impl ExecutionReport {
    /// Assemble the report from a drained graph. Every node is terminal by
    /// the time the executor calls this.
    pub(crate) fn from_graph(graph: TaskGraph) -> Self {
        let entries = graph
            .into_nodes()
            .into_iter()
            .map(|node| {
                let state = match node.state {
                    NodeState::Succeeded => TerminalState::Succeeded,
                    NodeState::Failed => TerminalState::Failed,
                    NodeState::Skipped => TerminalState::Skipped,
                    // Unreachable after Scheduler::finalize; treat as never
                    // having run.
                    NodeState::Pending | NodeState::Ready | NodeState::Running => {
                        TerminalState::Skipped
                    }
                };

                // A node can fail, retry and then succeed; its stale
                // last_failure is diagnostic history, not an outcome.
                let failure = (state == TerminalState::Failed)
                    .then_some(node.last_failure)
                    .flatten();
                let report = NodeReport {
                    rule: node.rule,
                    output: (state == TerminalState::Succeeded).then_some(node.output),
                    failure,
                    state,
                };
                (node.id, report)
            })
            .collect();

        Self { entries }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeReport> {
        self.entries.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeReport)> {
        self.entries.iter().map(|(id, report)| (*id, report))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every node succeeded.
    pub fn is_success(&self) -> bool {
        self.entries
            .values()
            .all(|r| r.state == TerminalState::Succeeded)
    }

    pub fn count(&self, state: TerminalState) -> usize {
        self.entries.values().filter(|r| r.state == state).count()
    }

    /// Ids in the given terminal state, in node order.
    pub fn nodes_in(&self, state: TerminalState) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, r)| r.state == state)
            .map(|(id, _)| id)
            .collect()
    }

    /// One line per node, for callers that just want something to log.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (id, report) in self.iter() {
            out.push_str(&format!("{id} {} {:?}", report.rule, report.state));
            if let Some(failure) = &report.failure {
                out.push_str(&format!(" ({failure})"));
            }
            out.push('\n');
        }
        out
    }
}
