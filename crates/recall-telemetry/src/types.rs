//! Side-channel diagnostic records

use crate::io::{append_jsonl, atomic_write, read_jsonl, read_jsonl_tail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One diagnostic emitted instead of surfacing an error to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub event: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(component: &str, event: &str, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            component: component.to_string(),
            event: event.to_string(),
            session_id: None,
            message: message.into(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Append-only JSONL log of diagnostics
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    path: PathBuf,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a diagnostic. Failures to write are ignored: the log is the
    /// last resort and has nowhere further to report to.
    pub fn record(&self, diagnostic: &Diagnostic) {
        let _ = append_jsonl(&self.path, diagnostic);
    }

    /// Most recent `limit` diagnostics, oldest first
    pub fn recent(&self, limit: usize) -> Vec<Diagnostic> {
        read_jsonl_tail(&self.path, limit).unwrap_or_default()
    }

    /// Keep only the newest `keep` records. Returns how many were dropped.
    pub fn truncate_to(&self, keep: usize) -> std::io::Result<usize> {
        let all: Vec<Diagnostic> = read_jsonl(&self.path)?;
        if all.len() <= keep {
            return Ok(0);
        }
        let dropped = all.len() - keep;
        let mut buf = String::new();
        for d in &all[dropped..] {
            buf.push_str(&serde_json::to_string(d)?);
            buf.push('\n');
        }
        atomic_write(&self.path, buf.as_bytes())?;
        Ok(dropped)
    }
}
