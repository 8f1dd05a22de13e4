// src/rule.rs

//! Rule specifications: typed templates for one pipeline step.
//!
//! A rule declares an input shape and an output shape, how to derive the
//! output from the input, and how to render the executable instruction for a
//! concrete (input, output) pair. Rules never execute anything themselves;
//! `derive_output` exists purely so the builder can wire the dependency graph
//! before any process runs.
//!
//! Two layers:
//! - [`Rule`] is the strongly typed authoring interface. Input and output
//!   shapes are ordinary serde types.
//! - [`RuleSpec`] is the object-safe form the graph builder works with,
//!   operating on `serde_json::Value`. Every `Rule` gets a `RuleSpec`
//!   implementation via the blanket impl below; shape mismatches surface as
//!   build-time [`GraphError::ShapeMismatch`], never as runtime failures.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::GraphError;

/// A typed pipeline step template.
///
/// Both `derive_output` and `render_instruction` must be pure: no side
/// effects, no process execution. The engine treats the rendered instruction
/// as an opaque string.
pub trait Rule: Send + Sync + 'static {
    type Input: Serialize + DeserializeOwned;
    type Output: Serialize + DeserializeOwned;

    /// Rule identity. Part of the memoization fingerprint, so it should be
    /// stable across runs.
    fn name(&self) -> &str;

    /// Derive the output shape from the input. Called once per task node at
    /// graph-construction time.
    fn derive_output(&self, input: &Self::Input) -> Self::Output;

    /// Render the instruction to execute for this (input, output) pair.
    fn render_instruction(&self, input: &Self::Input, output: &Self::Output) -> String;
}

/// Object-safe rule contract used by the graph builder.
pub trait RuleSpec: Send + Sync {
    fn name(&self) -> &str;

    /// Derive the output value for a resolved input value.
    ///
    /// A value that does not match the rule's declared input shape is a
    /// build-time wiring error.
    fn derive_output(&self, input: &Value) -> Result<Value, GraphError>;

    /// Render the instruction string for a resolved (input, output) pair.
    fn render_instruction(&self, input: &Value, output: &Value) -> Result<String, GraphError>;
}

impl<R: Rule> RuleSpec for R {
    fn name(&self) -> &str {
        Rule::name(self)
    }

    fn derive_output(&self, input: &Value) -> Result<Value, GraphError> {
        let input: R::Input =
            serde_json::from_value(input.clone()).map_err(|e| GraphError::ShapeMismatch {
                rule: Rule::name(self).to_string(),
                detail: format!("input does not match declared shape: {e}"),
            })?;

        let output = Rule::derive_output(self, &input);

        serde_json::to_value(&output).map_err(|e| GraphError::ShapeMismatch {
            rule: Rule::name(self).to_string(),
            detail: format!("derived output is not representable: {e}"),
        })
    }

    fn render_instruction(&self, input: &Value, output: &Value) -> Result<String, GraphError> {
        let input: R::Input =
            serde_json::from_value(input.clone()).map_err(|e| GraphError::ShapeMismatch {
                rule: Rule::name(self).to_string(),
                detail: format!("input does not match declared shape: {e}"),
            })?;
        let output: R::Output =
            serde_json::from_value(output.clone()).map_err(|e| GraphError::ShapeMismatch {
                rule: Rule::name(self).to_string(),
                detail: format!("output does not match declared shape: {e}"),
            })?;

        Ok(Rule::render_instruction(self, &input, &output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Words {
        text: String,
    }

    #[derive(Serialize, Deserialize)]
    struct Shouted {
        text: String,
    }

    struct Shout;

    impl Rule for Shout {
        type Input = Words;
        type Output = Shouted;

        fn name(&self) -> &str {
            "shout"
        }

        fn derive_output(&self, input: &Words) -> Shouted {
            Shouted {
                text: input.text.to_uppercase(),
            }
        }

        fn render_instruction(&self, _input: &Words, output: &Shouted) -> String {
            format!("echo {}", output.text)
        }
    }

    #[test]
    fn blanket_impl_round_trips_through_values() {
        let spec: &dyn RuleSpec = &Shout;

        let input = json!({ "text": "hello" });
        let output = spec.derive_output(&input).unwrap();
        assert_eq!(output, json!({ "text": "HELLO" }));

        let instruction = spec.render_instruction(&input, &output).unwrap();
        assert_eq!(instruction, "echo HELLO");
    }

    #[test]
    fn mismatched_input_shape_is_a_graph_error() {
        let spec: &dyn RuleSpec = &Shout;

        let err = spec.derive_output(&json!({ "wrong": 1 })).unwrap_err();
        match err {
            GraphError::ShapeMismatch { rule, .. } => assert_eq!(rule, "shout"),
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }
}
