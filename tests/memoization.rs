// tests/memoization.rs

//! Cross-run memoization: a second run over the same pipeline with a
//! shared cache completes every node from recorded outputs without
//! dispatching anything to the backend.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::mpsc;

use pipedag::engine::{Executor, SharedCache, TerminalState};
use pipedag::pipeline::{Binding, Pipeline};
use pipedag::{EngineConfig, ExecutionReport, MemoCache};

use pipedag_test_utils::rules::{AlignReads, CallVariants, SplitAlignment, TrimReads};
use pipedag_test_utils::{FakeBackend, init_tracing, with_timeout};

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

async fn run_once(cache: SharedCache) -> (ExecutionReport, usize) {
    let graph = genomics_pipeline().build().unwrap();
    let (event_tx, event_rx) = mpsc::channel(64);
    let backend = FakeBackend::new(event_tx);
    let log = backend.dispatch_log();

    let config = EngineConfig::default();
    let executor = Executor::new(graph, &config, cache, backend, event_rx);
    let report = with_timeout(executor.run()).await.unwrap();

    let dispatch_count = log.lock().unwrap().len();
    (report, dispatch_count)
}

#[tokio::test]
async fn second_run_completes_entirely_from_cache() {
    init_tracing();
    let cache: SharedCache = Arc::new(Mutex::new(MemoCache::new()));

    let (first, first_dispatches) = run_once(Arc::clone(&cache)).await;
    assert!(first.is_success());
    assert_eq!(first_dispatches, 6);
    assert_eq!(cache.lock().unwrap().len(), 6);

    let (second, second_dispatches) = run_once(Arc::clone(&cache)).await;
    assert!(second.is_success());
    assert_eq!(second_dispatches, 0, "cached nodes must not be dispatched");
    assert_eq!(second.count(TerminalState::Succeeded), 6);

    // Cached outputs match what the first run produced.
    for (id, entry) in first.iter() {
        let replayed = second.node(id).unwrap();
        assert_eq!(entry.output, replayed.output);
    }
    // Replay recorded nothing new.
    assert_eq!(cache.lock().unwrap().len(), 6);
}

#[tokio::test]
async fn distinct_inputs_do_not_share_cache_entries() {
    init_tracing();
    let cache: SharedCache = Arc::new(Mutex::new(MemoCache::new()));

    let (_, first_dispatches) = run_once(Arc::clone(&cache)).await;
    assert_eq!(first_dispatches, 6);

    // Same rules, different sample: every node misses the cache.
    let mut pipeline = Pipeline::new();
    pipeline.apply(
        TrimReads,
        Binding::literal(json!({
            "sample": "sampleB",
            "r1": "sampleB_R1.fastq",
            "r2": "sampleB_R2.fastq",
        })),
    );
    let graph = pipeline.build().unwrap();

    let (event_tx, event_rx) = mpsc::channel(64);
    let backend = FakeBackend::new(event_tx);
    let log = backend.dispatch_log();
    let config = EngineConfig::default();
    let executor = Executor::new(graph, &config, Arc::clone(&cache), backend, event_rx);
    let report = with_timeout(executor.run()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(log.lock().unwrap().len(), 1);
    assert_eq!(cache.lock().unwrap().len(), 7);
}
