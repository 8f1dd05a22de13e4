// src/pipeline.rs

//! Pipeline definition: an ordered sequence of rule applications with data
//! flow bindings.
//!
//! This is the engine's only configuration surface for graph shape. Each
//! [`Pipeline::apply`] call records one application and returns a [`StepId`]
//! that later applications use to reference its output. References can only
//! point backwards, which is what keeps the built graph acyclic by
//! construction.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::GraphError;
use crate::graph::TaskGraph;
use crate::graph::builder;
use crate::rule::{Rule, RuleSpec};

/// Handle to a prior rule application within a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(usize);

impl StepId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step{}", self.0)
    }
}

/// One ingredient of a binding expression.
#[derive(Debug, Clone)]
pub enum Part {
    /// A literal value supplied by the pipeline author.
    Literal(Value),
    /// The derived output of a prior application. If that application was a
    /// fan-out, this resolves to the sequence of the group's outputs
    /// (however many nodes it expanded into) and depends on all of them
    /// (fan-in).
    Step(StepId),
}

impl Part {
    pub fn literal(value: Value) -> Self {
        Part::Literal(value)
    }

    pub fn step(step: StepId) -> Self {
        Part::Step(step)
    }
}

/// How a rule application's input is assembled from literals and prior
/// outputs.
#[derive(Debug, Clone)]
pub enum Binding {
    /// The input is exactly this literal value.
    Literal(Value),
    /// Resolve each part and merge. A single part passes through unchanged
    /// (this is the fan-in form); multiple parts must all resolve to objects
    /// and are merged left to right, later keys winning.
    Merge(Vec<Part>),
    /// Fan-out: materialize one task node per element of the resolved
    /// sequence, each bound to one element. `extra` is an object merged into
    /// every element.
    Each { over: Part, extra: Option<Value> },
}

impl Binding {
    pub fn literal(value: Value) -> Self {
        Binding::Literal(value)
    }

    /// The whole output of a prior application.
    pub fn output_of(step: StepId) -> Self {
        Binding::Merge(vec![Part::Step(step)])
    }

    pub fn merge(parts: Vec<Part>) -> Self {
        Binding::Merge(parts)
    }

    /// One node per element of `step`'s output sequence; if `step` was
    /// itself a fan-out, one node per upstream node instead.
    pub fn each(step: StepId) -> Self {
        Binding::Each {
            over: Part::Step(step),
            extra: None,
        }
    }

    /// Like [`Binding::each`], with an object merged into every element.
    pub fn each_with(step: StepId, extra: Value) -> Self {
        Binding::Each {
            over: Part::Step(step),
            extra: Some(extra),
        }
    }

    /// Fan-out over a literal sequence, one node per element. This is how a
    /// pipeline seeds parallel per-sample subgraphs from its initial inputs.
    pub fn each_literal(items: Vec<Value>) -> Self {
        Binding::Each {
            over: Part::Literal(Value::Array(items)),
            extra: None,
        }
    }

    pub fn each_literal_with(items: Vec<Value>, extra: Value) -> Self {
        Binding::Each {
            over: Part::Literal(Value::Array(items)),
            extra: Some(extra),
        }
    }
}

/// One recorded rule application.
pub struct Application {
    pub(crate) rule: Arc<dyn RuleSpec>,
    pub(crate) binding: Binding,
}

/// Ordered sequence of rule applications, ready to be built into a
/// [`TaskGraph`].
#[derive(Default)]
pub struct Pipeline {
    applications: Vec<Application>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a typed rule application and return its handle.
    pub fn apply<R: Rule>(&mut self, rule: R, binding: Binding) -> StepId {
        self.apply_spec(Arc::new(rule), binding)
    }

    /// Record an application of an already-boxed rule specification.
    pub fn apply_spec(&mut self, rule: Arc<dyn RuleSpec>, binding: Binding) -> StepId {
        let id = StepId(self.applications.len());
        self.applications.push(Application { rule, binding });
        id
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Build the task graph. Never executes anything.
    pub fn build(self) -> Result<TaskGraph, GraphError> {
        builder::build(self.applications)
    }
}
