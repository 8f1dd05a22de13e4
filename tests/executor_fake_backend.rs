// tests/executor_fake_backend.rs

//! Executor behaviour against the fake backend: terminal states,
//! failure propagation, dispatch ordering and retries, all without
//! spawning real processes.

use serde_json::json;
use tokio::sync::mpsc;

use pipedag::engine::{Executor, RuntimeEvent, SharedCache, TerminalState};
use pipedag::pipeline::{Binding, Pipeline};
use pipedag::{EngineConfig, FailurePolicy, MemoCache};

use pipedag_test_utils::rules::{AlignReads, CallVariants, SplitAlignment, TrimReads};
use pipedag_test_utils::{FakeBackend, init_tracing, with_timeout};

fn fresh_cache() -> SharedCache {
    std::sync::Arc::new(std::sync::Mutex::new(MemoCache::new()))
}

/// trim -> align -> split -> 3x call, one sample, six nodes.
fn genomics_pipeline() -> Pipeline {
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
    pipeline
}

async fn run_with_backend(
    pipeline: Pipeline,
    config: &EngineConfig,
    make_backend: impl FnOnce(mpsc::Sender<RuntimeEvent>) -> FakeBackend,
) -> (pipedag::ExecutionReport, Vec<String>) {
    let graph = pipeline.build().expect("pipeline should build");
    let (event_tx, event_rx) = mpsc::channel(64);
    let backend = make_backend(event_tx);
    let log = backend.dispatch_log();

    let executor = Executor::new(graph, config, fresh_cache(), backend, event_rx);
    let report = with_timeout(executor.run()).await.expect("run should finish");

    let dispatched = log
        .lock()
        .unwrap()
        .iter()
        .map(|(_, rule)| rule.clone())
        .collect();
    (report, dispatched)
}

#[tokio::test]
async fn genomics_pipeline_runs_to_success() {
    init_tracing();
    let config = EngineConfig::default();

    let (report, dispatched) =
        run_with_backend(genomics_pipeline(), &config, FakeBackend::new).await;

    assert_eq!(report.len(), 6);
    assert!(report.is_success());
    assert_eq!(report.count(TerminalState::Succeeded), 6);
    assert_eq!(dispatched.len(), 6);

    // Per-chromosome fan-out produced one variant call per chromosome.
    let calls: Vec<_> = report
        .iter()
        .filter(|(_, r)| r.rule == "call-variants")
        .collect();
    assert_eq!(calls.len(), 3);
    for (_, call) in calls {
        let output = call.output.as_ref().expect("succeeded node has output");
        let vcf = output["vcf"].as_str().unwrap();
        assert!(vcf.starts_with("sampleA."), "unexpected vcf name {vcf}");
        assert!(vcf.ends_with(".vcf"));
    }
}

#[tokio::test]
async fn midstream_failure_skips_downstream_nodes() {
    init_tracing();
    let config = EngineConfig::default();

    let (report, _) = run_with_backend(genomics_pipeline(), &config, |tx| {
        FakeBackend::new(tx).fail_rule("split-alignment")
    })
    .await;

    assert!(!report.is_success());
    // trim and align still ran and succeeded.
    assert_eq!(report.count(TerminalState::Succeeded), 2);
    assert_eq!(report.count(TerminalState::Failed), 1);
    // The three variant calls were never attempted.
    assert_eq!(report.count(TerminalState::Skipped), 3);

    for id in report.nodes_in(TerminalState::Skipped) {
        let entry = report.node(id).unwrap();
        assert_eq!(entry.rule, "call-variants");
        assert!(entry.failure.is_none(), "skipped nodes carry no failure");
    }
    for id in report.nodes_in(TerminalState::Failed) {
        let entry = report.node(id).unwrap();
        assert_eq!(entry.rule, "split-alignment");
        let failure = entry.failure.as_ref().expect("failed node has detail");
        assert!(failure.stderr.contains("injected failure"));
    }
}

#[tokio::test]
async fn fail_fast_abandons_unstarted_work() {
    init_tracing();
    let config = EngineConfig {
        failure_policy: FailurePolicy::FailFast,
        ..EngineConfig::default()
    };

    let (report, dispatched) = run_with_backend(genomics_pipeline(), &config, |tx| {
        FakeBackend::new(tx).fail_rule("trim-reads")
    })
    .await;

    assert_eq!(report.count(TerminalState::Failed), 1);
    assert_eq!(report.count(TerminalState::Skipped), 5);
    assert_eq!(dispatched, vec!["trim-reads".to_string()]);
}

#[tokio::test]
async fn independent_nodes_dispatch_in_seeding_order() {
    init_tracing();
    let config = EngineConfig::default();

    let mut pipeline = Pipeline::new();
    let samples: Vec<_> = ["s1", "s2", "s3"]
        .iter()
        .map(|s| {
            json!({
                "sample": s,
                "r1": format!("{s}_R1.fastq"),
                "r2": format!("{s}_R2.fastq"),
            })
        })
        .collect();
    pipeline.apply(TrimReads, Binding::each_literal(samples));

    let (report, dispatched) = run_with_backend(pipeline, &config, FakeBackend::new).await;

    assert!(report.is_success());
    assert_eq!(dispatched, vec!["trim-reads"; 3]);

    // Dispatch follows node ids, which follow seeding order.
    let graph_order: Vec<_> = report.iter().map(|(id, _)| id).collect();
    assert!(graph_order.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn retries_redispatch_before_failing_terminally() {
    init_tracing();
    let config = EngineConfig {
        retry_limit: 2,
        ..EngineConfig::default()
    };

    let mut pipeline = Pipeline::new();
    pipeline.apply(
        TrimReads,
        Binding::literal(json!({
            "sample": "flaky",
            "r1": "flaky_R1.fastq",
            "r2": "flaky_R2.fastq",
        })),
    );

    let (report, dispatched) = run_with_backend(pipeline, &config, |tx| {
        FakeBackend::new(tx).fail_rule("trim-reads")
    })
    .await;

    // Initial attempt plus two retries.
    assert_eq!(dispatched.len(), 3);
    assert_eq!(report.count(TerminalState::Failed), 1);
}

#[tokio::test]
async fn flaky_node_that_recovers_succeeds_cleanly() {
    init_tracing();
    let config = EngineConfig {
        retry_limit: 2,
        ..EngineConfig::default()
    };

    // trim fails twice, recovers on the third attempt; the rest of the
    // chain then runs normally.
    let (report, dispatched) = run_with_backend(genomics_pipeline(), &config, |tx| {
        FakeBackend::new(tx).fail_rule_times("trim-reads", 2)
    })
    .await;

    assert!(report.is_success(), "summary: {}", report.summary());
    assert_eq!(report.count(TerminalState::Succeeded), 6);
    assert_eq!(
        dispatched.iter().filter(|r| *r == "trim-reads").count(),
        3
    );

    // A recovered node reports as a plain success: output present, no
    // failure detail left over from the failed attempts.
    for (_, entry) in report.iter() {
        assert!(entry.output.is_some());
        assert!(entry.failure.is_none(), "rule {} kept stale failure", entry.rule);
    }
}
