//! Narrative-generation collaborators. Each one is a request → draft call;
//! the orchestrator bounds it with a timeout.

use crate::error::SummarizeError;
use crate::request::{parse_draft, SummaryDraft, SummaryRequest};
use async_trait::async_trait;
use recall_core::{SummarizeConfig, SummarizerBackend};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryDraft, SummarizeError>;
}

/// Build the configured collaborator. `None` when summarization is off.
pub fn from_config(config: &SummarizeConfig) -> Result<Option<Box<dyn Summarizer>>, SummarizeError> {
    match config.backend {
        SummarizerBackend::None => Ok(None),
        SummarizerBackend::Anthropic => Ok(Some(Box::new(AnthropicSummarizer::from_config(config)?))),
        SummarizerBackend::Command => Ok(Some(Box::new(CommandSummarizer::from_config(config)?))),
    }
}

/// Messages API client
pub struct AnthropicSummarizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl AnthropicSummarizer {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &SummarizeConfig) -> Result<Self, SummarizeError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SummarizeError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(&config.endpoint, &config.model, api_key))
    }

    fn prompt(request: &SummaryRequest) -> String {
        let mut prompt = format!("{}\n\nSession: {}\n", request.instruction, request.session_id);
        if let Some(project) = &request.project {
            prompt.push_str(&format!("Project: {project}\n"));
        }
        if !request.files.is_empty() {
            prompt.push_str(&format!("Files touched: {}\n", request.files.join(", ")));
        }
        prompt.push_str("\nEvents:\n");
        prompt.push_str(&request.transcript);
        prompt
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryDraft, SummarizeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": Self::prompt(request)}]
            }))
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("no error message");
            return Err(SummarizeError::Collaborator(format!("{status}: {message}")));
        }

        let text = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| SummarizeError::InvalidResponse("reply has no text block".to_string()))?;
        parse_draft(text)
    }
}

/// Subprocess boundary: request JSON on stdin, draft JSON on stdout
pub struct CommandSummarizer {
    program: String,
    args: Vec<String>,
}

impl CommandSummarizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &SummarizeConfig) -> Result<Self, SummarizeError> {
        let (program, args) = config.command.split_first().ok_or_else(|| {
            SummarizeError::Collaborator("summarize.command is empty".to_string())
        })?;
        Ok(Self::new(program, args.to_vec()))
    }
}

#[async_trait]
impl Summarizer for CommandSummarizer {
    fn name(&self) -> &str {
        &self.program
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryDraft, SummarizeError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropped by the orchestrator's timeout: take the process with it
            .kill_on_drop(true)
            .spawn()?;

        let payload = serde_json::to_vec(request)
            .map_err(|e| SummarizeError::Collaborator(e.to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SummarizeError::Collaborator(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                tail(stderr.trim(), 500)
            )));
        }
        parse_draft(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Last `max` characters of `text`
fn tail(text: &str, max: usize) -> &str {
    let start = text
        .char_indices()
        .rev()
        .nth(max.saturating_sub(1))
        .map_or(0, |(i, _)| i);
    &text[start..]
}
