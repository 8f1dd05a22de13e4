// src/graph/builder.rs

//! Task graph construction from an ordered sequence of rule applications.
//!
//! Applications are processed in sequence order. For each one the binding
//! expression is resolved against the derived outputs of already-built nodes,
//! the node's own output is derived eagerly (construction time, not execution
//! time) so later applications can wire against it, and the instruction is
//! rendered. Any unresolvable reference or shape mismatch aborts the whole
//! build with a [`GraphError`]; the builder never executes anything.

use serde_json::Value;
use tracing::debug;

use crate::cache::Fingerprint;
use crate::errors::GraphError;
use crate::graph::TaskGraph;
use crate::graph::node::{NodeId, NodeState, TaskNode};
use crate::pipeline::{Application, Binding, Part};

/// A binding part resolved to a concrete value plus the upstream nodes it
/// depends on.
struct Resolved {
    value: Value,
    deps: Vec<NodeId>,
}

pub(crate) fn build(applications: Vec<Application>) -> Result<TaskGraph, GraphError> {
    let mut graph = TaskGraph::new();

    for (step, app) in applications.into_iter().enumerate() {
        let rule_name = app.rule.name().to_string();
        let inputs = resolve_binding(&graph, step, &rule_name, &app.binding)?;

        let mut ids = Vec::with_capacity(inputs.len());
        for Resolved { value, deps } in inputs {
            let output = app.rule.derive_output(&value)?;
            let instruction = app.rule.render_instruction(&value, &output)?;
            let fingerprint = Fingerprint::of(&rule_name, &value);

            let id = graph.push_node(TaskNode {
                id: NodeId(0), // assigned by push_node
                rule: rule_name.clone(),
                input: value,
                output,
                instruction,
                fingerprint,
                deps: dedup_deps(deps),
                dependents: Vec::new(),
                state: NodeState::Pending,
                attempts: 0,
                last_failure: None,
            });
            ids.push(id);
        }

        let expanded = matches!(app.binding, Binding::Each { .. });
        debug!(step, rule = %rule_name, nodes = ids.len(), expanded, "built step");
        graph.push_step(ids, expanded);
    }

    graph.validate_acyclic()?;
    Ok(graph)
}

/// Resolve a binding into one (input, deps) pair per task node to create.
fn resolve_binding(
    graph: &TaskGraph,
    step: usize,
    rule: &str,
    binding: &Binding,
) -> Result<Vec<Resolved>, GraphError> {
    match binding {
        Binding::Literal(value) => Ok(vec![Resolved {
            value: value.clone(),
            deps: Vec::new(),
        }]),

        Binding::Merge(parts) => {
            let resolved: Vec<Resolved> = parts
                .iter()
                .map(|part| resolve_part(graph, step, part))
                .collect::<Result<_, _>>()?;
            Ok(vec![merge_resolved(step, rule, resolved)?])
        }

        Binding::Each { over, extra } => resolve_each(graph, step, rule, over, extra.as_ref()),
    }
}

/// Resolve one binding part against already-built steps.
fn resolve_part(graph: &TaskGraph, step: usize, part: &Part) -> Result<Resolved, GraphError> {
    match part {
        Part::Literal(value) => Ok(Resolved {
            value: value.clone(),
            deps: Vec::new(),
        }),
        Part::Step(reference) => {
            if reference.index() >= step {
                return Err(GraphError::UnresolvedReference {
                    step,
                    reference: reference.index(),
                });
            }

            let ids = graph.step_nodes(*reference);
            match (graph.step_expanded(*reference), ids) {
                // A plain step contributes its single node's output directly.
                (false, [only]) => Ok(Resolved {
                    value: graph.node(*only).output.clone(),
                    deps: vec![*only],
                }),
                // A fan-out group contributes the sequence of its nodes'
                // outputs and depends on all of them (fan-in), regardless
                // of how many nodes it expanded into.
                (_, group) => Ok(Resolved {
                    value: Value::Array(
                        group.iter().map(|id| graph.node(*id).output.clone()).collect(),
                    ),
                    deps: group.to_vec(),
                }),
            }
        }
    }
}

/// Merge resolved parts into a single input.
///
/// A single part passes through unchanged; multiple parts must all be
/// objects and merge left to right, later keys winning.
fn merge_resolved(
    step: usize,
    rule: &str,
    mut resolved: Vec<Resolved>,
) -> Result<Resolved, GraphError> {
    if resolved.is_empty() {
        return Ok(Resolved {
            value: Value::Object(Default::default()),
            deps: Vec::new(),
        });
    }
    if resolved.len() == 1 {
        return Ok(resolved.remove(0));
    }

    let mut merged = serde_json::Map::new();
    let mut deps = Vec::new();

    for Resolved { value, deps: mut d } in resolved {
        match value {
            Value::Object(map) => merged.extend(map),
            other => {
                return Err(GraphError::MergeNotAnObject {
                    step,
                    rule: rule.to_string(),
                    found: value_kind(&other),
                });
            }
        }
        deps.append(&mut d);
    }

    Ok(Resolved {
        value: Value::Object(merged),
        deps,
    })
}

/// Resolve a fan-out binding into one (input, deps) pair per element.
fn resolve_each(
    graph: &TaskGraph,
    step: usize,
    rule: &str,
    over: &Part,
    extra: Option<&Value>,
) -> Result<Vec<Resolved>, GraphError> {
    // A reference to a step that was itself a fan-out pairs one downstream
    // node with each upstream node, whatever the group's size.
    if let Part::Step(reference) = over {
        if reference.index() >= step {
            return Err(GraphError::UnresolvedReference {
                step,
                reference: reference.index(),
            });
        }
        if graph.step_expanded(*reference) {
            return graph
                .step_nodes(*reference)
                .iter()
                .map(|id| {
                    let element = graph.node(*id).output.clone();
                    Ok(Resolved {
                        value: merge_extra(step, rule, element, extra)?,
                        deps: vec![*id],
                    })
                })
                .collect();
        }
    }

    // Otherwise the part must resolve to a sequence; one node per element,
    // all sharing the part's dependencies.
    let Resolved { value, deps } = resolve_part(graph, step, over)?;
    let Value::Array(elements) = value else {
        return Err(GraphError::NotASequence {
            step,
            rule: rule.to_string(),
            found: value_kind(&value),
        });
    };

    elements
        .into_iter()
        .map(|element| {
            Ok(Resolved {
                value: merge_extra(step, rule, element, extra)?,
                deps: deps.clone(),
            })
        })
        .collect()
}

fn merge_extra(
    step: usize,
    rule: &str,
    element: Value,
    extra: Option<&Value>,
) -> Result<Value, GraphError> {
    let Some(extra) = extra else {
        return Ok(element);
    };

    let Value::Object(mut base) = element else {
        return Err(GraphError::MergeNotAnObject {
            step,
            rule: rule.to_string(),
            found: value_kind(&element),
        });
    };
    let Value::Object(extra) = extra else {
        return Err(GraphError::MergeNotAnObject {
            step,
            rule: rule.to_string(),
            found: value_kind(extra),
        });
    };

    base.extend(extra.clone());
    Ok(Value::Object(base))
}

/// Drop duplicate dependency edges (e.g. a merge referencing the same step
/// twice) while preserving first-seen order.
fn dedup_deps(deps: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = std::collections::HashSet::new();
    deps.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "an object",
    }
}
