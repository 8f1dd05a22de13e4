// src/engine/mod.rs

//! Execution engine: the async shell around the pure scheduler.
//!
//! The scheduler (`graph::scheduler`) holds all ordering semantics; this
//! module owns the event loop that reacts to process completions delivered
//! over an mpsc channel, gates dispatch on the resource pool and the
//! memoization cache, and assembles the final [`ExecutionReport`].

use crate::exec::RunResult;
use crate::graph::node::NodeId;

/// Events flowing into the executor loop from backends.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A dispatched node's process finished with a concrete result.
    NodeCompleted { node: NodeId, result: RunResult },
}

pub mod executor;
pub mod report;

pub use executor::{Executor, SharedCache};
pub use report::{ExecutionReport, NodeReport, TerminalState};
