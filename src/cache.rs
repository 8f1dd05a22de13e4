// src/cache.rs

//! Run-scoped memoization of successful task outputs.
//!
//! Entries are keyed by a blake3 fingerprint of (rule identity, canonical
//! serialization of the resolved input value) and map to the output of a
//! previously recorded success. The cache is append-only for the duration of
//! a run; there is no eviction.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::errors::ConsistencyError;

/// Memoization key: blake3 of (rule name, canonical input JSON).
///
/// Canonical serialization relies on `serde_json`'s default map
/// representation, which keeps object keys sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(rule: &str, input: &Value) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(rule.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") cannot collide.
        hasher.update(&[0]);
        hasher.update(input.to_string().as_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviated hex is plenty for logs and error messages.
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// In-memory memoization cache shared by all tasks of a run.
#[derive(Debug, Default)]
pub struct MemoCache {
    entries: HashMap<Fingerprint, Value>,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<&Value> {
        self.entries.get(fingerprint)
    }

    /// Record a successful output for a fingerprint.
    ///
    /// Recording the same output twice is a no-op. Recording a *different*
    /// output for an existing fingerprint violates the determinism contract
    /// and is surfaced as a [`ConsistencyError`] rather than overwritten.
    pub fn record(&mut self, fingerprint: Fingerprint, output: Value) -> Result<(), ConsistencyError> {
        match self.entries.get(&fingerprint) {
            None => {
                debug!(%fingerprint, "recording memoized output");
                self.entries.insert(fingerprint, output);
                Ok(())
            }
            Some(existing) if *existing == output => Ok(()),
            Some(existing) => Err(ConsistencyError {
                fingerprint,
                existing: existing.clone(),
                offered: output,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_depends_on_rule_and_input() {
        let a = Fingerprint::of("trim", &json!({ "r1": "a.fq" }));
        let b = Fingerprint::of("trim", &json!({ "r1": "b.fq" }));
        let c = Fingerprint::of("align", &json!({ "r1": "a.fq" }));

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, Fingerprint::of("trim", &json!({ "r1": "a.fq" })));
    }

    #[test]
    fn fingerprint_ignores_object_key_order() {
        let a = Fingerprint::of("trim", &json!({ "r1": "a", "r2": "b" }));
        let b = Fingerprint::of("trim", &json!({ "r2": "b", "r1": "a" }));
        assert_eq!(a, b);
    }

    #[test]
    fn record_is_idempotent_for_equal_outputs() {
        let mut cache = MemoCache::new();
        let fp = Fingerprint::of("trim", &json!({ "r1": "a.fq" }));

        cache.record(fp, json!({ "out": "a.trimmed" })).unwrap();
        cache.record(fp, json!({ "out": "a.trimmed" })).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&fp), Some(&json!({ "out": "a.trimmed" })));
    }

    #[test]
    fn conflicting_record_is_a_consistency_error() {
        let mut cache = MemoCache::new();
        let fp = Fingerprint::of("trim", &json!({ "r1": "a.fq" }));

        cache.record(fp, json!({ "out": "first" })).unwrap();
        let err = cache.record(fp, json!({ "out": "second" })).unwrap_err();

        assert_eq!(err.existing, json!({ "out": "first" }));
        assert_eq!(err.offered, json!({ "out": "second" }));
        // Original entry is untouched.
        assert_eq!(cache.lookup(&fp), Some(&json!({ "out": "first" })));
    }
}
