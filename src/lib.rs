// src/lib.rs

//! pipedag: a typed task-graph execution engine for multi-step
//! external-command pipelines.
//!
//! A pipeline is assembled from [`Rule`]s (typed transformation steps)
//! wired together with [`Binding`] expressions, compiled into a
//! [`TaskGraph`], and executed with bounded concurrency by the
//! [`Executor`]. Successful outputs are memoized in a [`MemoCache`]
//! keyed by a content [`Fingerprint`] of (rule, input).

pub mod cache;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod pipeline;
pub mod rule;

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

pub use cache::{Fingerprint, MemoCache};
pub use config::{EngineConfig, FailurePolicy, load_from_path};
pub use engine::{
    ExecutionReport, Executor, NodeReport, RuntimeEvent, SharedCache, TerminalState,
};
pub use errors::{EngineError, GraphError, Result};
pub use exec::{ExecutorBackend, ProcessBackend, ResourcePool, RunResult, RunStatus};
pub use graph::{
    DispatchedNode, FailureDetail, FailureKind, NodeId, NodeState, TaskGraph, TaskNode,
};
pub use logging::init_logging;
pub use pipeline::{Binding, Part, Pipeline, StepId};
pub use rule::{Rule, RuleSpec};

/// Capacity of the completion-event channel between spawned task
/// futures and the executor's control loop.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Build and run `pipeline` to completion with a fresh cache.
///
/// Instructions are executed as real shell processes. Returns the
/// per-node [`ExecutionReport`] once every node has reached a terminal
/// state.
pub async fn run_pipeline(
    pipeline: Pipeline,
    config: &EngineConfig,
) -> Result<ExecutionReport> {
    let cache: SharedCache = Arc::new(Mutex::new(MemoCache::new()));
    run_pipeline_with_cache(pipeline, config, cache).await
}

/// Like [`run_pipeline`], but reuses `cache` so that nodes whose
/// (rule, input) fingerprint was already recorded by an earlier run
/// complete without spawning a process.
pub async fn run_pipeline_with_cache(
    pipeline: Pipeline,
    config: &EngineConfig,
    cache: SharedCache,
) -> Result<ExecutionReport> {
    let graph = pipeline.build()?;
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let backend = ProcessBackend::new(event_tx);
    let executor = Executor::new(graph, config, cache, backend, event_rx);
    executor.run().await
}
