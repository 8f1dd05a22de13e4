// src/errors.rs

//! Crate-wide error types and the shared `Result` alias.

use serde_json::Value;
use thiserror::Error;

use crate::cache::Fingerprint;

/// Static wiring errors detected while building a task graph.
///
/// Every variant is fatal to the whole build; nothing has executed when one
/// of these is returned, and none of them is ever retried.
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("step {step} references step {reference}, which is not defined before it")]
    UnresolvedReference { step: usize, reference: usize },

    #[error("rule '{rule}' rejected a value at build time: {detail}")]
    ShapeMismatch { rule: String, detail: String },

    #[error("fan-out for rule '{rule}' at step {step} requires a sequence, got {found}")]
    NotASequence {
        step: usize,
        rule: String,
        found: &'static str,
    },

    #[error("merge binding for rule '{rule}' at step {step} requires objects, got {found}")]
    MergeNotAnObject {
        step: usize,
        rule: String,
        found: &'static str,
    },

    #[error("cycle detected in task graph involving node {0}")]
    Cycle(String),
}

/// The memoization cache observed two different outputs for one fingerprint.
///
/// Rule execution is assumed deterministic for identical inputs; a conflict
/// is a contract violation and aborts the run rather than being silently
/// overwritten.
#[derive(Error, Debug, Clone)]
#[error(
    "non-deterministic output for fingerprint {fingerprint}: \
     cache holds {existing}, execution produced {offered}"
)]
pub struct ConsistencyError {
    pub fingerprint: Fingerprint,
    pub existing: Value,
    pub offered: Value,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("graph construction failed: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("runtime event channel closed before the graph drained")]
    ChannelClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
