// src/graph/graph.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::GraphError;
use crate::graph::node::{NodeId, TaskNode};
use crate::pipeline::StepId;

/// The built task graph: nodes plus the dependency edges induced by data
/// flow.
///
/// Node ids are dense indices in construction order. The builder only lets a
/// node depend on nodes constructed before it, so construction order is a
/// topological order; [`TaskGraph::validate_acyclic`] double-checks that
/// invariant after construction.
#[derive(Debug, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    /// Node ids created for each pipeline step, in step order.
    steps: Vec<StepNodes>,
}

/// The nodes one pipeline step materialized into.
///
/// `expanded` distinguishes a fan-out group from a plain single-node step;
/// a fan-out group keeps its group semantics even when it happens to hold
/// one node (or none: a fan-out over an empty sequence).
#[derive(Debug)]
struct StepNodes {
    ids: Vec<NodeId>,
    expanded: bool,
}

impl TaskGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TaskNode {
        &mut self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    pub(crate) fn into_nodes(self) -> Vec<TaskNode> {
        self.nodes
    }

    /// Node ids materialized for a pipeline step.
    pub fn step_nodes(&self, step: StepId) -> &[NodeId] {
        self.steps
            .get(step.index())
            .map(|s| s.ids.as_slice())
            .unwrap_or(&[])
    }

    /// Whether a pipeline step was a fan-out group, independent of how many
    /// nodes it expanded into.
    pub fn step_expanded(&self, step: StepId) -> bool {
        self.steps
            .get(step.index())
            .map(|s| s.expanded)
            .unwrap_or(false)
    }

    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).deps
    }

    pub fn dependents_of(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).dependents
    }

    /// Append a node, wiring the reverse (dependent) edges of its deps.
    pub(crate) fn push_node(&mut self, mut node: TaskNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.id = id;

        for dep in node.deps.clone() {
            self.nodes[dep.index()].dependents.push(id);
        }

        self.nodes.push(node);
        id
    }

    pub(crate) fn push_step(&mut self, ids: Vec<NodeId>, expanded: bool) -> StepId {
        let step = StepId::new(self.steps.len());
        self.steps.push(StepNodes { ids, expanded });
        step
    }

    /// Topological-sort check over all dependency edges.
    ///
    /// Construction cannot produce a cycle, so a failure here indicates a
    /// builder bug rather than a user error.
    pub(crate) fn validate_acyclic(&self) -> Result<(), GraphError> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();

        for node in &self.nodes {
            graph.add_node(node.id.index());
            for dep in &node.deps {
                graph.add_edge(dep.index(), node.id.index(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(GraphError::Cycle(format!("n{}", cycle.node_id()))),
        }
    }
}
