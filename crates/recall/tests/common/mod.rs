use async_trait::async_trait;
use recall_capture::{CaptureOutcome, CapturePipeline};
use recall_core::CaptureConfig;
use recall_store::{Store, StoreOptions};
use recall_summarize::{SummarizeError, Summarizer, SummaryDraft, SummaryRequest};
use serde_json::{json, Value};
use tempfile::TempDir;

pub fn open_store(dir: &TempDir) -> Store {
    Store::open(dir.path().join("recall.db"), StoreOptions::new()).unwrap()
}

/// Feed native hook payloads through the capture pipeline
pub fn capture_all(store: &Store, payloads: &[Value]) -> Vec<CaptureOutcome> {
    let config = CaptureConfig::new();
    let pipeline = CapturePipeline::new(store, &config);
    payloads
        .iter()
        .map(|p| pipeline.capture_raw(&p.to_string()))
        .collect()
}

pub fn tool(session: &str, cwd: &str, name: &str, input: Value, response: Value) -> Value {
    json!({
        "hook_event_name": "PostToolUse",
        "session_id": session,
        "cwd": cwd,
        "tool_name": name,
        "tool_input": input,
        "tool_response": response,
    })
}

pub fn lifecycle(session: &str, cwd: &str, event: &str) -> Value {
    json!({"hook_event_name": event, "session_id": session, "cwd": cwd})
}

pub fn prompt(session: &str, cwd: &str, text: &str) -> Value {
    json!({
        "hook_event_name": "UserPromptSubmit",
        "session_id": session,
        "cwd": cwd,
        "prompt": text,
    })
}

/// Collaborator that writes a summary from the transcript it was handed
pub struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    fn name(&self) -> &str {
        "echo"
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryDraft, SummarizeError> {
        let first_line = request.transcript.lines().next().unwrap_or_default();
        Ok(SummaryDraft {
            intent: format!("Session over {} files", request.files.len()),
            learned: vec![first_line.to_string()],
            notable_failures: request
                .transcript
                .lines()
                .filter(|l| l.starts_with("[failure]"))
                .map(str::to_string)
                .collect(),
            ..SummaryDraft::default()
        })
    }
}
