// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`runner`] runs one rendered instruction via `tokio::process::Command`
//!   with stream capture and a timeout.
//! - [`backend`] provides the [`ExecutorBackend`] seam the engine dispatches
//!   through, plus the production [`ProcessBackend`].
//! - [`pool`] tracks the bounded set of execution slots.

pub mod backend;
pub mod pool;
pub mod runner;

pub use backend::{ExecutorBackend, ProcessBackend};
pub use pool::ResourcePool;
pub use runner::{RunResult, RunStatus};
