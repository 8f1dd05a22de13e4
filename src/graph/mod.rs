// src/graph/mod.rs

//! Task graph construction and scheduling.
//!
//! - [`node`] defines task nodes, their state machine and failure detail.
//! - [`graph`] holds the built DAG and its adjacency information.
//! - [`builder`] turns an ordered sequence of rule applications into a
//!   [`TaskGraph`], expanding fan-out and fan-in.
//! - [`scheduler`] is the pure per-run state machine deciding what is ready
//!   to dispatch and how failure propagates.

pub mod builder;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod node;
pub mod scheduler;

pub use graph::TaskGraph;
pub use node::{DispatchedNode, FailureDetail, FailureKind, NodeId, NodeState, TaskNode};
pub use scheduler::{Scheduler, SchedulerStep};
