//! Hook entry points. Each reads one host payload from stdin, never fails the
//! host: every error ends in a diagnostic and exit 0.

use super::{Env, Exit};
use crate::worker::{self, WorkerHandle};
use recall_capture::{parse_event, CaptureOutcome, CapturePipeline, EventEnvelope, HookEvent};
use recall_core::SummarizerBackend;
use recall_retrieve::{Retriever, SessionContext};
use recall_telemetry::{changed_files, Diagnostic, DiagnosticLog};
use std::io::{self, Read};
use std::path::PathBuf;

fn read_stdin() -> String {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        tracing::warn!(error = %e, "failed to read hook payload");
    }
    input
}

fn with_env(f: impl FnOnce(&Env)) {
    match Env::load() {
        Ok(env) => f(&env),
        Err(e) => tracing::warn!(error = %e, "no home directory, hook skipped"),
    }
}

fn record(log: &DiagnosticLog, component: &str, event: &str, message: impl Into<String>) {
    log.record(&Diagnostic::new(component, event, message));
}

pub fn capture() -> anyhow::Result<Exit> {
    let input = read_stdin();
    with_env(|env| {
        capture_with(env, &input);
    });
    Ok(Exit::Ok)
}

/// Capture one raw payload. `None` when the store could not be opened.
pub fn capture_with(env: &Env, raw: &str) -> Option<CaptureOutcome> {
    let log = env.diagnostics();
    let store = match env.open_store() {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(error = %e, "store unavailable, event dropped");
            record(&log, "capture", "store_unavailable", e.to_string());
            return None;
        }
    };
    let outcome = CapturePipeline::new(&store, &env.config.capture)
        .with_diagnostics(&log)
        .capture_raw(raw);
    Some(outcome)
}

pub fn session_start() -> anyhow::Result<Exit> {
    let input = read_stdin();
    with_env(|env| {
        if let Some(output) = session_start_with(env, &input) {
            println!("{output}");
        }
    });
    Ok(Exit::Ok)
}

/// Record the session and build the context to inject. Returns the hook's
/// stdout JSON, or `None` when there is nothing to recall.
pub fn session_start_with(env: &Env, raw: &str) -> Option<String> {
    let log = env.diagnostics();
    let envelope = if raw.trim().is_empty() {
        EventEnvelope {
            session_id: None,
            cwd: None,
            event: HookEvent::SessionStart,
        }
    } else {
        match parse_event(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                record(&log, "capture", "dropped", e.to_string());
                EventEnvelope {
                    session_id: None,
                    cwd: None,
                    event: HookEvent::SessionStart,
                }
            }
        }
    };

    match env.open_store() {
        Ok(store) => {
            CapturePipeline::new(&store, &env.config.capture)
                .with_diagnostics(&log)
                .capture(&envelope);
        }
        Err(e) => {
            tracing::warn!(error = %e, "store unavailable at session start");
            record(&log, "capture", "store_unavailable", e.to_string());
        }
    }

    let cwd = envelope
        .cwd
        .as_deref()
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok());
    let mut ctx = match envelope.session_id.as_deref() {
        Some(id) => SessionContext::for_session(id),
        None => SessionContext::new(),
    };
    if let Some(cwd) = &cwd {
        ctx = ctx
            .with_project(cwd.to_string_lossy())
            .with_files(changed_files(cwd).iter().map(|p| p.to_string_lossy().into_owned()));
    }

    let retrieval = Retriever::new(&env.config.retrieval).retrieve_or_empty(env.open_reader(), &ctx);
    for layer in &retrieval.degraded {
        let mut diagnostic = Diagnostic::new("retrieve", "degraded", layer.clone());
        if let Some(id) = &ctx.session_id {
            diagnostic = diagnostic.with_session(id.clone());
        }
        log.record(&diagnostic);
    }
    tracing::debug!(
        items = retrieval.items.len(),
        fallback = retrieval.fallback,
        "session context"
    );

    if retrieval.is_empty() {
        return None;
    }
    let output = serde_json::json!({
        "hookSpecificOutput": {
            "hookEventName": "SessionStart",
            "additionalContext": retrieval.rendered,
        }
    });
    Some(output.to_string())
}

pub fn session_end() -> anyhow::Result<Exit> {
    let input = read_stdin();
    with_env(|env| {
        session_end_with(env, &input, worker::spawn_detached);
    });
    Ok(Exit::Ok)
}

/// Close the session, then make sure a summarization worker is on its way.
/// Returns whether a worker was started. Never waits for it.
pub fn session_end_with<F>(env: &Env, raw: &str, spawn: F) -> bool
where
    F: FnOnce() -> io::Result<()>,
{
    let raw = if raw.trim().is_empty() {
        r#"{"kind":"session_end"}"#
    } else {
        raw
    };
    let Some(CaptureOutcome::SessionEnded { session_id }) = capture_with(env, raw) else {
        return false;
    };
    if env.config.summarize.backend == SummarizerBackend::None {
        return false;
    }

    let handle = WorkerHandle::new(env.paths.worker_marker());
    match handle.ensure_started(spawn) {
        Ok(started) => started,
        Err(e) => {
            tracing::warn!(error = %e, "could not start summarization worker");
            let diagnostic = Diagnostic::new("worker", "spawn_failed", e.to_string())
                .with_session(session_id);
            env.diagnostics().record(&diagnostic);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::scratch_env;
    use serde_json::{json, Value};

    #[test]
    fn test_capture_with_records_native_payload() {
        let (_temp, env) = scratch_env();
        let payload = json!({
            "hook_event_name": "PostToolUse",
            "session_id": "s1",
            "cwd": "/repo",
            "tool_name": "Read",
            "tool_input": {"file_path": "src/lib.rs"},
        });

        let outcome = capture_with(&env, &payload.to_string()).unwrap();
        let CaptureOutcome::Observation(obs) = outcome else {
            panic!("expected observation, got {outcome:?}");
        };
        assert_eq!(obs.content, "read /repo/src/lib.rs");
    }

    #[test]
    fn test_garbage_payload_only_leaves_a_diagnostic() {
        let (_temp, env) = scratch_env();
        let outcome = capture_with(&env, "not json at all").unwrap();
        assert!(outcome.is_dropped());
        assert_eq!(env.diagnostics().recent(10).len(), 1);
    }

    #[test]
    fn test_session_start_on_empty_store_injects_nothing() {
        let (_temp, env) = scratch_env();
        let payload = json!({"kind": "session_start", "session_id": "s1", "cwd": "/nowhere"});
        assert!(session_start_with(&env, &payload.to_string()).is_none());

        let reader = env.open_reader().unwrap();
        let session = reader.session("s1").unwrap().unwrap();
        assert_eq!(session.project.as_deref(), Some("/nowhere"));
    }

    #[test]
    fn test_session_start_injects_prior_summary() {
        let (_temp, env) = scratch_env();
        {
            let store = env.open_store().unwrap();
            store.ensure_session("earlier", Some("/proj")).unwrap();
            store
                .upsert_summary(&recall_core::Summary {
                    session_id: "earlier".to_string(),
                    intent: "Fix flaky login test".to_string(),
                    learned: vec!["The clock is mocked in auth tests".to_string()],
                    completed: vec![],
                    next_steps: vec![],
                    notable_failures: vec![],
                    files: vec!["/proj/auth.rs".to_string()],
                    created_at: chrono::Utc::now(),
                })
                .unwrap();
        }

        let payload = json!({"hook_event_name": "SessionStart", "session_id": "now", "cwd": "/proj"});
        let output = session_start_with(&env, &payload.to_string()).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        let context = value["hookSpecificOutput"]["additionalContext"].as_str().unwrap();
        assert_eq!(value["hookSpecificOutput"]["hookEventName"], "SessionStart");
        assert!(context.contains("Fix flaky login test"));
    }

    #[test]
    fn test_session_end_starts_worker_once() {
        let (_temp, env) = scratch_env();
        let payload = json!({"kind": "session_end", "session_id": "s1"}).to_string();

        assert!(session_end_with(&env, &payload, || Ok(())));

        // A live worker holds the marker: no second spawn
        let _guard = WorkerHandle::new(env.paths.worker_marker())
            .acquire()
            .unwrap()
            .unwrap();
        assert!(!session_end_with(&env, &payload, || panic!("spawned twice")));
        let session = env.open_reader().unwrap().session("s1").unwrap().unwrap();
        assert!(session.ended_at.is_some());
    }

    #[test]
    fn test_session_end_without_backend_never_spawns() {
        let (_temp, mut env) = scratch_env();
        env.config.summarize.backend = SummarizerBackend::None;
        let payload = json!({"kind": "session_end", "session_id": "s1"}).to_string();
        assert!(!session_end_with(&env, &payload, || panic!("no backend")));
    }

    #[test]
    fn test_failed_spawn_is_a_diagnostic_not_an_error() {
        let (_temp, env) = scratch_env();
        let payload = json!({"kind": "session_end", "session_id": "s1"}).to_string();
        assert!(!session_end_with(&env, &payload, || Err(io::Error::other("exec failed"))));

        let recent = env.diagnostics().recent(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].event, "spawn_failed");
        assert_eq!(recent[0].session_id.as_deref(), Some("s1"));
    }
}
