// src/config/mod.rs

//! Engine configuration: tunables for capacity, retries, failure policy and
//! per-process timeouts.
//!
//! - [`model`] defines the serde-deserializable structs and their defaults.
//! - [`loader`] reads them from TOML and applies sanity checks.

pub mod loader;
pub mod model;

pub use loader::{default_config_path, load_from_path};
pub use model::{EngineConfig, FailurePolicy};
