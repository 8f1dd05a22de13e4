// demos/genomics.rs

//! Two-sample read-processing pipeline: trim, align, split per
//! chromosome, then call variants on each piece. Twelve task nodes in
//! total, executed as real (echo-based) shell processes.
//!
//! Run with `cargo run --example genomics`; set `PIPEDAG_LOG=debug` to
//! watch the dispatch decisions.

use anyhow::Result;
use serde_json::json;

use pipedag::pipeline::{Binding, Pipeline};
use pipedag::{EngineConfig, TerminalState, init_logging, run_pipeline};

use pipedag_test_utils::rules::{AlignReads, CallVariants, SplitAlignment, TrimReads};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(None)?;

    let samples = [("sampleA", "A"), ("sampleB", "B")];

    let mut pipeline = Pipeline::new();
    for (sample, tag) in samples {
        let trim = pipeline.apply(
            TrimReads,
            Binding::literal(json!({
                "sample": sample,
                "r1": format!("reads_{tag}_R1.fastq"),
                "r2": format!("reads_{tag}_R2.fastq"),
            })),
        );
        let align = pipeline.apply(AlignReads, Binding::output_of(trim));
        let split = pipeline.apply(SplitAlignment, Binding::output_of(align));
        pipeline.apply(CallVariants, Binding::each(split));
    }

    let config = EngineConfig::default();
    let report = run_pipeline(pipeline, &config).await?;

    println!("{}", report.summary());
    for (id, entry) in report.iter() {
        match entry.state {
            TerminalState::Succeeded => {
                println!("{id}  {:<16} ok", entry.rule);
            }
            TerminalState::Failed => {
                let detail = entry
                    .failure
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_default();
                println!("{id}  {:<16} FAILED ({detail})", entry.rule);
            }
            TerminalState::Skipped => {
                println!("{id}  {:<16} skipped", entry.rule);
            }
        }
    }

    Ok(())
}
