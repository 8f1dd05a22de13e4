// tests/pipeline_genomics.rs

//! End-to-end runs through `run_pipeline` with real shell processes.

use serde_json::json;

use pipedag::graph::FailureKind;
use pipedag::pipeline::{Binding, Part, Pipeline};
use pipedag::{EngineConfig, TerminalState, run_pipeline};

use pipedag_test_utils::rules::{
    AlignReads, CallVariants, RunRaw, SplitAlignment, TrimReads,
};
use pipedag_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn full_genomics_chain_succeeds_with_real_processes() {
    init_tracing();

    let mut pipeline = Pipeline::new();
    let trim = pipeline.apply(
        TrimReads,
        Binding::literal(json!({
            "sample": "sampleA",
            "r1": "sampleA_R1.fastq",
            "r2": "sampleA_R2.fastq",
        })),
    );
    let align = pipeline.apply(AlignReads, Binding::output_of(trim));
    let split = pipeline.apply(SplitAlignment, Binding::output_of(align));
    pipeline.apply(CallVariants, Binding::each(split));

    let config = EngineConfig::default();
    let report = with_timeout(run_pipeline(pipeline, &config)).await.unwrap();

    assert!(report.is_success(), "summary: {}", report.summary());
    assert_eq!(report.count(TerminalState::Succeeded), 6);
}

#[tokio::test]
async fn nonzero_exit_fails_the_node_and_skips_dependents() {
    init_tracing();

    let mut pipeline = Pipeline::new();
    let broken = pipeline.apply(
        RunRaw,
        Binding::literal(json!({"label": "broken", "command": "exit 3"})),
    );
    pipeline.apply(
        RunRaw,
        Binding::merge(vec![
            Part::step(broken),
            Part::literal(json!({"label": "downstream", "command": "echo ok"})),
        ]),
    );

    let config = EngineConfig::default();
    let report = with_timeout(run_pipeline(pipeline, &config)).await.unwrap();

    assert_eq!(report.count(TerminalState::Failed), 1);
    assert_eq!(report.count(TerminalState::Skipped), 1);

    let failed = report.nodes_in(TerminalState::Failed)[0];
    let detail = report.node(failed).unwrap().failure.as_ref().unwrap();
    assert!(matches!(detail.kind, FailureKind::NonZeroExit(3)));
}

#[cfg(unix)]
#[tokio::test]
async fn retries_rerun_the_process_until_the_limit() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("attempts.log");
    let command = format!("echo attempt >> {}; exit 1", marker.display());

    let mut pipeline = Pipeline::new();
    pipeline.apply(
        RunRaw,
        Binding::literal(json!({"label": "flaky", "command": command})),
    );

    let config = EngineConfig {
        retry_limit: 2,
        ..EngineConfig::default()
    };
    let report = with_timeout(run_pipeline(pipeline, &config)).await.unwrap();

    assert_eq!(report.count(TerminalState::Failed), 1);
    let attempts = std::fs::read_to_string(&marker).unwrap();
    assert_eq!(attempts.lines().count(), 3);
}

#[cfg(unix)]
#[tokio::test]
async fn overlong_process_is_killed_and_reported_as_timeout() {
    init_tracing();

    let mut pipeline = Pipeline::new();
    pipeline.apply(
        RunRaw,
        Binding::literal(json!({"label": "slow", "command": "sleep 30"})),
    );

    let config = EngineConfig {
        task_timeout_secs: 1,
        ..EngineConfig::default()
    };
    let report = with_timeout(run_pipeline(pipeline, &config)).await.unwrap();

    assert_eq!(report.count(TerminalState::Failed), 1);
    let failed = report.nodes_in(TerminalState::Failed)[0];
    let detail = report.node(failed).unwrap().failure.as_ref().unwrap();
    assert!(matches!(detail.kind, FailureKind::TimedOut));
}
