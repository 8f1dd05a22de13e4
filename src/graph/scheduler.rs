// src/graph/scheduler.rs

//! Pure scheduling state machine over a built task graph.
//!
//! The scheduler owns the graph for the duration of a run and is the only
//! thing that mutates per-node state. It is synchronous and deterministic:
//! no channels, no Tokio types, no IO. The async executor shell
//! (`engine::executor`) feeds it dispatch requests and completion outcomes
//! and acts on what it returns, which keeps all ordering semantics unit
//! testable without processes.
//!
//! Ready nodes are handed out first-ready-first-dispatched: the queue is
//! seeded in construction order and dependents are appended as their last
//! dependency succeeds, so identical graphs with identical concurrency get
//! identical schedules.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::Fingerprint;
use crate::config::FailurePolicy;
use crate::graph::TaskGraph;
use crate::graph::node::{DispatchedNode, FailureDetail, NodeId, NodeState, TaskNode};

/// Structured result of feeding one completion into the scheduler.
///
/// Useful for tests that step the graph manually and assert on exactly what
/// changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Nodes that became ready as a result of this step.
    pub newly_ready: Vec<NodeId>,
    /// Nodes newly marked `Skipped` because of an upstream terminal failure.
    pub newly_skipped: Vec<NodeId>,
    /// Whether this step drained the graph (no ready, no running work left).
    pub run_finished: bool,
}

#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    ready: VecDeque<NodeId>,
    /// Per-node count of upstream dependencies not yet succeeded.
    unresolved: Vec<usize>,
    running: usize,
    retry_limit: u32,
    failure_policy: FailurePolicy,
    /// Set under fail-fast once any node fails terminally; suppresses all
    /// further dispatch while in-flight work drains.
    halted: bool,
}

impl Scheduler {
    pub fn new(graph: TaskGraph, retry_limit: u32, failure_policy: FailurePolicy) -> Self {
        let unresolved: Vec<usize> = graph.nodes().map(|n| n.deps.len()).collect();

        let mut scheduler = Self {
            graph,
            ready: VecDeque::new(),
            unresolved,
            running: 0,
            retry_limit,
            failure_policy,
            halted: false,
        };

        // Seed with zero-dependency nodes in construction order.
        let roots: Vec<NodeId> = scheduler
            .graph
            .nodes()
            .filter(|n| n.deps.is_empty())
            .map(|n| n.id)
            .collect();
        for id in roots {
            scheduler.mark_ready(id);
        }

        info!(
            nodes = scheduler.graph.len(),
            roots = scheduler.ready.len(),
            "scheduler initialised"
        );
        scheduler
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn node(&self, id: NodeId) -> &TaskNode {
        self.graph.node(id)
    }

    /// Next node to dispatch, honouring FIFO ready order. Returns `None`
    /// when the ready queue is empty or dispatch is halted (fail-fast).
    pub fn next_ready(&mut self) -> Option<NodeId> {
        if self.halted {
            return None;
        }
        self.ready.pop_front()
    }

    /// Return a popped node to the head of the queue (resource pool refusal;
    /// backpressure, not a failure, so its retry counter is untouched).
    pub fn requeue_front(&mut self, id: NodeId) {
        self.ready.push_front(id);
    }

    /// Transition a popped ready node to `Running`.
    pub fn mark_running(&mut self, id: NodeId) {
        let node = self.graph.node_mut(id);
        debug_assert_eq!(node.state, NodeState::Ready);
        node.state = NodeState::Running;
        self.running += 1;
    }

    pub fn running(&self) -> usize {
        self.running
    }

    /// Whether the run is drained: nothing in flight and nothing left to
    /// dispatch (or dispatch is halted).
    pub fn finished(&self) -> bool {
        self.running == 0 && (self.halted || self.ready.is_empty())
    }

    /// Fingerprint and derived output of a node, for cache bookkeeping.
    pub fn node_record(&self, id: NodeId) -> (Fingerprint, serde_json::Value) {
        let node = self.graph.node(id);
        (node.fingerprint, node.output.clone())
    }

    pub fn dispatch_info(&self, id: NodeId, timeout: Duration) -> DispatchedNode {
        DispatchedNode::from_node(self.graph.node(id), timeout)
    }

    /// Mark a popped ready node `Succeeded` with a memoized output, without
    /// it ever running.
    pub fn complete_cached(&mut self, id: NodeId, output: serde_json::Value) -> SchedulerStep {
        debug!(node = %id, "completing from cache");
        self.graph.node_mut(id).output = output;
        self.settle_success(id)
    }

    /// Handle a successful process completion.
    pub fn complete_success(&mut self, id: NodeId) -> SchedulerStep {
        debug_assert_eq!(self.graph.node(id).state, NodeState::Running);
        self.running -= 1;
        self.settle_success(id)
    }

    /// Handle a failed process completion: retry if the policy allows,
    /// otherwise fail terminally and skip the downstream subgraph.
    pub fn complete_failure(&mut self, id: NodeId, detail: FailureDetail) -> SchedulerStep {
        debug_assert_eq!(self.graph.node(id).state, NodeState::Running);
        self.running -= 1;

        let node = self.graph.node_mut(id);
        node.attempts += 1;
        let attempts = node.attempts;

        if attempts <= self.retry_limit {
            warn!(
                node = %id,
                rule = %node.rule,
                attempts,
                retry_limit = self.retry_limit,
                failure = %detail,
                "attempt failed; returning node to ready queue"
            );
            node.last_failure = Some(detail);
            node.state = NodeState::Ready;
            self.ready.push_back(id);
            return SchedulerStep {
                run_finished: self.finished(),
                ..Default::default()
            };
        }

        warn!(
            node = %id,
            rule = %node.rule,
            attempts,
            failure = %detail,
            "retries exhausted; failing node and skipping dependents"
        );
        node.last_failure = Some(detail);
        node.state = NodeState::Failed;

        let newly_skipped = self.skip_dependents(id);

        if self.failure_policy == FailurePolicy::FailFast && !self.halted {
            info!(node = %id, "fail-fast: suppressing further dispatch");
            self.halted = true;
        }

        SchedulerStep {
            newly_ready: Vec::new(),
            newly_skipped,
            run_finished: self.finished(),
        }
    }

    /// Consume the scheduler once [`finished`](Self::finished) holds,
    /// marking anything never dispatched (fail-fast leftovers) as `Skipped`.
    pub fn finalize(mut self) -> TaskGraph {
        debug_assert!(self.finished());

        for index in 0..self.graph.len() {
            let node = self.graph.node_mut(NodeId(index));
            match node.state {
                NodeState::Pending | NodeState::Ready => {
                    debug!(node = %node.id, "run ended before dispatch; marking Skipped");
                    node.state = NodeState::Skipped;
                }
                NodeState::Running => {
                    // finished() excludes this; keep the graph consistent
                    // even if it happens.
                    warn!(node = %node.id, "node still Running at finalize");
                    node.state = NodeState::Skipped;
                }
                _ => {}
            }
        }

        self.graph
    }

    fn mark_ready(&mut self, id: NodeId) {
        let node = self.graph.node_mut(id);
        debug_assert_eq!(node.state, NodeState::Pending);
        node.state = NodeState::Ready;
        self.ready.push_back(id);
    }

    fn settle_success(&mut self, id: NodeId) -> SchedulerStep {
        let node = self.graph.node_mut(id);
        node.state = NodeState::Succeeded;
        debug!(node = %id, rule = %node.rule, "node succeeded");

        let mut newly_ready = Vec::new();
        for dependent in self.graph.dependents_of(id).to_vec() {
            let remaining = &mut self.unresolved[dependent.index()];
            *remaining -= 1;
            if *remaining == 0 && self.graph.node(dependent).state == NodeState::Pending {
                self.mark_ready(dependent);
                newly_ready.push(dependent);
            }
        }

        SchedulerStep {
            newly_ready,
            newly_skipped: Vec::new(),
            run_finished: self.finished(),
        }
    }

    /// Transitively mark every dependent of a terminally failed node
    /// `Skipped`. Only `Pending` nodes can be affected: a dependent cannot
    /// be `Ready` or beyond while one of its dependencies is unfinished.
    fn skip_dependents(&mut self, failed: NodeId) -> Vec<NodeId> {
        let mut stack: Vec<NodeId> = self.graph.dependents_of(failed).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(id) = stack.pop() {
            let node = self.graph.node_mut(id);
            if node.state == NodeState::Pending {
                node.state = NodeState::Skipped;
                debug!(node = %id, rule = %node.rule, "skipped due to upstream failure");
                newly_skipped.push(id);
                stack.extend(self.graph.dependents_of(id).iter().copied());
            }
        }

        newly_skipped
    }
}
