// crates/test-utils/src/fake_backend.rs

//! A fake [`ExecutorBackend`] for exercising the executor without
//! spawning real processes.
//!
//! Every dispatched node is recorded (in dispatch order) and completed
//! immediately with exit code 0, unless its rule name was registered
//! with [`FakeBackend::fail_rule`], in which case it exits 1.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use pipedag::engine::RuntimeEvent;
use pipedag::errors::{EngineError, Result};
use pipedag::exec::{ExecutorBackend, RunResult, RunStatus};
use pipedag::graph::{DispatchedNode, NodeId};

/// Shared log of dispatches, `(node id, rule name)` in dispatch order.
pub type DispatchLog = Arc<Mutex<Vec<(NodeId, String)>>>;

#[derive(Debug, Clone, Copy)]
enum FailurePlan {
    Always,
    /// Fail this many more dispatches, then succeed.
    Times(u32),
}

pub struct FakeBackend {
    event_tx: mpsc::Sender<RuntimeEvent>,
    dispatches: DispatchLog,
    failing_rules: HashMap<String, FailurePlan>,
}

impl FakeBackend {
    pub fn new(event_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            event_tx,
            dispatches: Arc::new(Mutex::new(Vec::new())),
            failing_rules: HashMap::new(),
        }
    }

    /// Make every node of `rule` complete with exit code 1.
    pub fn fail_rule(mut self, rule: impl Into<String>) -> Self {
        self.failing_rules.insert(rule.into(), FailurePlan::Always);
        self
    }

    /// Make the first `times` dispatches of `rule` complete with exit
    /// code 1, and any after that succeed. For flaky-then-recovered runs.
    pub fn fail_rule_times(mut self, rule: impl Into<String>, times: u32) -> Self {
        self.failing_rules.insert(rule.into(), FailurePlan::Times(times));
        self
    }

    /// Handle to the dispatch log; clone before handing the backend to
    /// the executor.
    pub fn dispatch_log(&self) -> DispatchLog {
        Arc::clone(&self.dispatches)
    }

    fn result_for(&mut self, node: &DispatchedNode) -> RunResult {
        let fail = match self.failing_rules.get_mut(&node.rule) {
            Some(FailurePlan::Always) => true,
            Some(FailurePlan::Times(remaining)) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        if fail {
            RunResult {
                status: RunStatus::Exited(1),
                stdout: String::new(),
                stderr: format!("injected failure for {}", node.rule),
            }
        } else {
            RunResult {
                status: RunStatus::Exited(0),
                stdout: node.instruction.clone(),
                stderr: String::new(),
            }
        }
    }
}

impl ExecutorBackend for FakeBackend {
    fn spawn_ready(
        &mut self,
        nodes: Vec<DispatchedNode>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for node in nodes {
                self.dispatches
                    .lock()
                    .expect("dispatch log poisoned")
                    .push((node.id, node.rule.clone()));

                let result = self.result_for(&node);
                self.event_tx
                    .send(RuntimeEvent::NodeCompleted {
                        node: node.id,
                        result,
                    })
                    .await
                    .map_err(|_| EngineError::ChannelClosed)?;
            }
            Ok(())
        })
    }
}
