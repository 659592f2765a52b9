use criterion::{criterion_group, criterion_main, Criterion};
use recall_capture::CapturePipeline;
use recall_core::CaptureConfig;
use recall_store::{Store, StoreOptions};
use std::hint::black_box;
use tempfile::TempDir;

fn bench_capture_command(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(temp_dir.path().join("recall.db"), StoreOptions::new()).unwrap();
    let config = CaptureConfig::new();
    let pipeline = CapturePipeline::new(&store, &config);

    let payload = serde_json::json!({
        "hook_event_name": "PostToolUse",
        "session_id": "bench",
        "cwd": "/repo",
        "tool_name": "Bash",
        "tool_input": {"command": "cargo check --workspace"},
        "tool_response": {"stdout": "Finished", "stderr": "", "exit_code": 0},
    })
    .to_string();

    c.bench_function("capture_command", |b| {
        b.iter(|| {
            let outcome = pipeline.capture_raw(black_box(&payload));
            assert!(!outcome.is_dropped());
        });
    });
}

fn bench_capture_malformed(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(temp_dir.path().join("recall.db"), StoreOptions::new()).unwrap();
    let config = CaptureConfig::new();
    let pipeline = CapturePipeline::new(&store, &config);

    c.bench_function("capture_malformed", |b| {
        b.iter(|| pipeline.capture_raw(black_box("{not json")));
    });
}

criterion_group!(benches, bench_capture_command, bench_capture_malformed);
criterion_main!(benches);
