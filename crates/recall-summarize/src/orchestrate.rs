//! Session-level orchestration: gather, call the collaborator, persist

use crate::collaborator::Summarizer;
use crate::error::SummarizeError;
use crate::request::{touched_files, transcript, SummaryRequest, INSTRUCTION};
use chrono::Utc;
use recall_core::{SummarizeConfig, Summary};
use recall_store::{StorageError, Store};
use recall_telemetry::{Diagnostic, DiagnosticLog};
use std::time::Duration;

const COMPONENT: &str = "summarize";

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    Stored(Summary),
    /// Session had no prompts or observations to summarize
    Empty,
}

/// Result of one pending-queue pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingReport {
    pub summarized: Vec<String>,
    pub empty: Vec<String>,
    /// Session id and error message
    pub failed: Vec<(String, String)>,
}

impl PendingReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct SessionSummarizer<'a> {
    store: &'a Store,
    summarizer: &'a dyn Summarizer,
    timeout: Duration,
    max_input_chars: usize,
    batch_limit: usize,
    diagnostics: Option<&'a DiagnosticLog>,
}

impl<'a> SessionSummarizer<'a> {
    pub fn new(store: &'a Store, summarizer: &'a dyn Summarizer, config: &SummarizeConfig) -> Self {
        Self {
            store,
            summarizer,
            timeout: Duration::from_secs(config.timeout_secs),
            max_input_chars: config.max_input_chars,
            batch_limit: config.batch_limit,
            diagnostics: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_diagnostics(mut self, log: &'a DiagnosticLog) -> Self {
        self.diagnostics = Some(log);
        self
    }

    /// Assemble the collaborator request. `None` for a session with no events.
    pub fn build_request(&self, session_id: &str) -> Result<Option<SummaryRequest>, SummarizeError> {
        let reader = self.store.reader()?;
        let session = reader
            .session(session_id)?
            .ok_or_else(|| StorageError::NotFound(format!("session {session_id}")))?;
        if session.ended_at.is_none() {
            return Err(SummarizeError::SessionOpen(session_id.to_string()));
        }

        let prompts = reader.session_prompts(session_id)?;
        let observations = reader.session_observations(session_id)?;
        if prompts.is_empty() && observations.is_empty() {
            return Ok(None);
        }

        let mut files = touched_files(&observations);
        let mut seen = std::collections::HashSet::new();
        files.retain(|f| seen.insert(f.clone()));

        Ok(Some(SummaryRequest {
            session_id: session_id.to_string(),
            project: session.project,
            instruction: INSTRUCTION.to_string(),
            transcript: transcript(&prompts, &observations, self.max_input_chars),
            files,
        }))
    }

    /// Summarize one closed session, replacing any earlier summary. On any
    /// failure the session is left as it was.
    pub async fn summarize_session(&self, session_id: &str) -> Result<SummaryOutcome, SummarizeError> {
        let result = self.run(session_id).await;
        if let Err(err) = &result {
            tracing::warn!(session = session_id, error = %err, "summary not produced");
            if let Some(log) = self.diagnostics {
                let event = if err.is_collaborator() { "collaborator_failed" } else { "failed" };
                log.record(&Diagnostic::new(COMPONENT, event, err.to_string()).with_session(session_id));
            }
        }
        result
    }

    async fn run(&self, session_id: &str) -> Result<SummaryOutcome, SummarizeError> {
        let Some(request) = self.build_request(session_id)? else {
            tracing::debug!(session = session_id, "nothing to summarize");
            return Ok(SummaryOutcome::Empty);
        };

        let draft = tokio::time::timeout(self.timeout, self.summarizer.summarize(&request))
            .await
            .map_err(|_| SummarizeError::Timeout {
                millis: self.timeout.as_millis(),
            })??;

        // Every occurrence, so the store can count touches per file
        let reader = self.store.reader()?;
        let files = touched_files(&reader.session_observations(session_id)?);
        let summary = draft.into_summary(session_id, files);
        self.store.upsert_summary(&summary)?;

        let stored = reader
            .summary(session_id)?
            .ok_or_else(|| StorageError::NotFound(format!("summary {session_id}")))?;
        tracing::info!(
            session = session_id,
            collaborator = self.summarizer.name(),
            files = stored.files.len(),
            "session summarized"
        );
        Ok(SummaryOutcome::Stored(stored))
    }

    /// Closed sessions without a current summary, one at a time. A failure
    /// is recorded against the session, which then backs off so it cannot
    /// crowd newer sessions out of later batches.
    pub async fn summarize_pending(&self) -> Result<PendingReport, SummarizeError> {
        let pending = self.store.reader()?.sessions_pending_summary(self.batch_limit)?;
        let mut report = PendingReport::default();
        for session in pending {
            match self.summarize_session(&session.id).await {
                Ok(SummaryOutcome::Stored(_)) => report.summarized.push(session.id),
                Ok(SummaryOutcome::Empty) => report.empty.push(session.id),
                Err(err) => {
                    if !matches!(err, SummarizeError::SessionOpen(_)) {
                        self.note_failure(&session.id);
                    }
                    report.failed.push((session.id, err.to_string()));
                }
            }
        }
        Ok(report)
    }

    fn note_failure(&self, session_id: &str) {
        match self.store.record_summary_failure(session_id, Utc::now()) {
            Ok(failures) => tracing::debug!(session = session_id, failures, "summary deferred"),
            Err(e) => tracing::warn!(session = session_id, error = %e, "could not record summary failure"),
        }
    }
}
