// src/engine/executor.rs

//! Async driver around the pure scheduler.
//!
//! All graph mutation happens here, in a single event loop: pop ready nodes,
//! gate them on the resource pool, short-circuit through the memoization
//! cache, hand the rest to the backend, and feed completion events back into
//! the scheduler until the graph drains. Suspension happens only while
//! awaiting events; pool and cache are touched strictly between suspension
//! points, never across a process execution.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::MemoCache;
use crate::config::EngineConfig;
use crate::engine::RuntimeEvent;
use crate::engine::report::ExecutionReport;
use crate::errors::{EngineError, Result};
use crate::exec::{ExecutorBackend, ResourcePool, RunResult, RunStatus};
use crate::graph::node::{FailureDetail, FailureKind, NodeId};
use crate::graph::{Scheduler, TaskGraph};

/// Shared handle to a memoization cache, reusable across runs.
pub type SharedCache = Arc<Mutex<MemoCache>>;

pub struct Executor<B: ExecutorBackend> {
    scheduler: Scheduler,
    pool: ResourcePool,
    cache: SharedCache,
    backend: B,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    timeout: Duration,
}

impl<B: ExecutorBackend> Executor<B> {
    pub fn new(
        graph: TaskGraph,
        config: &EngineConfig,
        cache: SharedCache,
        backend: B,
        event_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Self {
        let scheduler = Scheduler::new(graph, config.retry_limit, config.failure_policy);
        Self {
            scheduler,
            pool: ResourcePool::new(config.pool_capacity),
            cache,
            backend,
            event_rx,
            timeout: config.task_timeout(),
        }
    }

    /// Drive the graph to completion and assemble the report.
    ///
    /// Terminal per-node failures live in the report; only contract
    /// violations (a [`crate::errors::ConsistencyError`]) and infrastructure
    /// faults surface as `Err`.
    pub async fn run(mut self) -> Result<ExecutionReport> {
        info!(
            nodes = self.scheduler.graph().len(),
            capacity = self.pool.capacity(),
            "executor started"
        );

        self.dispatch_ready().await?;

        while !self.scheduler.finished() {
            let event = self
                .event_rx
                .recv()
                .await
                .ok_or(EngineError::ChannelClosed)?;

            match event {
                RuntimeEvent::NodeCompleted { node, result } => {
                    self.handle_completion(node, result)?;
                }
            }

            self.dispatch_ready().await?;
        }

        let graph = self.scheduler.finalize();
        let report = ExecutionReport::from_graph(graph);
        info!(
            nodes = report.len(),
            success = report.is_success(),
            "executor finished"
        );
        Ok(report)
    }

    /// Dispatch ready nodes in FIFO order until the queue or the pool is
    /// exhausted. Cache hits complete synchronously and may ready further
    /// nodes, so this loops until no more progress is possible.
    async fn dispatch_ready(&mut self) -> Result<()> {
        loop {
            let Some(id) = self.scheduler.next_ready() else {
                return Ok(());
            };

            if !self.pool.try_acquire() {
                // Backpressure: keep the node first in line for the next
                // free slot.
                self.scheduler.requeue_front(id);
                return Ok(());
            }

            let (fingerprint, _) = self.scheduler.node_record(id);
            let cached = self
                .cache
                .lock()
                .expect("cache mutex poisoned")
                .lookup(&fingerprint)
                .cloned();

            if let Some(output) = cached {
                debug!(node = %id, %fingerprint, "cache hit; skipping execution");
                self.pool.release();
                self.scheduler.complete_cached(id, output);
                continue;
            }

            self.scheduler.mark_running(id);
            let dispatch = self.scheduler.dispatch_info(id, self.timeout);
            self.backend.spawn_ready(vec![dispatch]).await?;
        }
    }

    fn handle_completion(&mut self, id: NodeId, result: RunResult) -> Result<()> {
        self.pool.release();

        if result.success() {
            let (fingerprint, output) = self.scheduler.node_record(id);
            self.cache
                .lock()
                .expect("cache mutex poisoned")
                .record(fingerprint, output)?;

            let step = self.scheduler.complete_success(id);
            debug!(
                node = %id,
                newly_ready = step.newly_ready.len(),
                "node completed successfully"
            );
        } else {
            let detail = failure_detail(result);
            warn!(node = %id, failure = %detail, "node attempt failed");
            self.scheduler.complete_failure(id, detail);
        }

        Ok(())
    }
}

fn failure_detail(result: RunResult) -> FailureDetail {
    let kind = match result.status {
        RunStatus::Exited(code) => FailureKind::NonZeroExit(code),
        RunStatus::TimedOut => FailureKind::TimedOut,
        RunStatus::SpawnFailed(detail) => FailureKind::SpawnFailed(detail),
    };
    FailureDetail {
        kind,
        stdout: result.stdout,
        stderr: result.stderr,
    }
}
