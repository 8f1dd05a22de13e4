// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The executor talks to an [`ExecutorBackend`] instead of spawning
//! processes directly. Production uses [`ProcessBackend`], which runs each
//! dispatched node as an external process and reports back over the runtime
//! event channel; tests substitute a fake that records dispatches and emits
//! completion events without touching the OS.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::RuntimeEvent;
use crate::errors::{EngineError, Result};
use crate::exec::runner::run_instruction;
use crate::graph::DispatchedNode;

/// Trait abstracting how dispatched nodes are executed.
///
/// Implementations must eventually deliver one
/// [`RuntimeEvent::NodeCompleted`] per dispatched node; admission control
/// (the resource pool) has already happened by the time a node reaches a
/// backend.
pub trait ExecutorBackend: Send {
    fn spawn_ready(
        &mut self,
        nodes: Vec<DispatchedNode>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real backend: one external process per dispatched node.
pub struct ProcessBackend {
    event_tx: mpsc::Sender<RuntimeEvent>,
}

impl ProcessBackend {
    pub fn new(event_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { event_tx }
    }
}

impl ExecutorBackend for ProcessBackend {
    fn spawn_ready(
        &mut self,
        nodes: Vec<DispatchedNode>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.event_tx.clone();

        Box::pin(async move {
            for node in nodes {
                debug!(node = %node.id, rule = %node.rule, "spawning process for node");
                let tx = tx.clone();

                tokio::spawn(async move {
                    let result = run_instruction(&node.instruction, node.timeout).await;
                    // The receiver only disappears if the run was dropped;
                    // nothing useful to do with the completion then.
                    let _ = tx
                        .send(RuntimeEvent::NodeCompleted {
                            node: node.id,
                            result,
                        })
                        .await;
                });
            }

            if tx.is_closed() {
                return Err(EngineError::ChannelClosed);
            }
            Ok(())
        })
    }
}
