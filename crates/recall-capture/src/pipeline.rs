//! Event → redact → persist, within the hook's time budget

use crate::event::{parse_event, EventEnvelope};
use crate::extract::{extract, Action, Skip};
use chrono::Utc;
use recall_core::{CaptureConfig, NewObservation, Observation, Prompt, DEFAULT_SESSION_ID};
use recall_store::{writes, Store};
use recall_telemetry::{Diagnostic, DiagnosticLog};
use std::time::{Duration, Instant};

const COMPONENT: &str = "capture";

/// Result of capturing one event. Never an error: failures become `Dropped`.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Observation(Observation),
    Prompt(Prompt),
    SessionStarted { session_id: String, created: bool },
    SessionEnded { session_id: String },
    Dropped(DropReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Payload could not be classified
    Malformed(String),
    /// Canonical `kind` outside the known set
    Unknown,
    /// Known host event that carries nothing to record
    Ignored(String),
    /// Required field present but empty
    MissingField(&'static str),
    /// Persistence failed or ran past the budget
    Abandoned(String),
}

impl DropReason {
    /// Ignored events are routine and do not warrant a diagnostic
    pub fn is_noteworthy(&self) -> bool {
        !matches!(self, DropReason::Ignored(_))
    }
}

impl CaptureOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, CaptureOutcome::Dropped(_))
    }
}

pub struct CapturePipeline<'a> {
    store: &'a Store,
    config: &'a CaptureConfig,
    diagnostics: Option<&'a DiagnosticLog>,
}

impl<'a> CapturePipeline<'a> {
    pub fn new(store: &'a Store, config: &'a CaptureConfig) -> Self {
        Self {
            store,
            config,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, log: &'a DiagnosticLog) -> Self {
        self.diagnostics = Some(log);
        self
    }

    /// Capture one raw hook payload
    pub fn capture_raw(&self, raw: &str) -> CaptureOutcome {
        match parse_event(raw) {
            Ok(envelope) => self.capture(&envelope),
            Err(err) => self.drop_event(None, DropReason::Malformed(err.to_string())),
        }
    }

    pub fn capture(&self, envelope: &EventEnvelope) -> CaptureOutcome {
        let deadline = Instant::now() + Duration::from_millis(self.config.hook_budget_ms);
        let session_id = envelope
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SESSION_ID);
        let project = envelope.cwd.as_deref();

        let action = extract(&envelope.event, envelope.cwd.as_deref(), self.config);
        let at = Utc::now();

        let result = match action {
            Action::Drop(Skip::Ignored(name)) => {
                return self.drop_event(Some(session_id), DropReason::Ignored(name))
            }
            Action::Drop(Skip::Unknown) => return self.drop_event(Some(session_id), DropReason::Unknown),
            Action::Drop(Skip::Empty(field)) => {
                return self.drop_event(Some(session_id), DropReason::MissingField(field))
            }

            Action::Observe {
                kind,
                content,
                metadata,
            } => {
                let new = NewObservation {
                    session_id: session_id.to_string(),
                    kind,
                    content,
                    metadata,
                };
                self.store
                    .write_until(Some(deadline), |tx| {
                        writes::ensure_session(tx, session_id, project, &at)?;
                        writes::record_observation(tx, &new, &at)
                    })
                    .map(CaptureOutcome::Observation)
            }

            Action::Prompt { source, text } => self
                .store
                .write_until(Some(deadline), |tx| {
                    writes::ensure_session(tx, session_id, project, &at)?;
                    writes::record_prompt(tx, session_id, source, &text, &at)
                })
                .map(CaptureOutcome::Prompt),

            Action::SessionStart => self
                .store
                .write_until(Some(deadline), |tx| {
                    writes::start_session(tx, session_id, project, &at)
                })
                .map(|created| CaptureOutcome::SessionStarted {
                    session_id: session_id.to_string(),
                    created,
                }),

            Action::SessionEnd => self
                .store
                .write_until(Some(deadline), |tx| {
                    writes::ensure_session(tx, session_id, project, &at)?;
                    writes::end_session(tx, session_id, &at)
                })
                .map(|()| CaptureOutcome::SessionEnded {
                    session_id: session_id.to_string(),
                }),
        };

        match result {
            Ok(outcome) => {
                tracing::debug!(
                    session = session_id,
                    kind = envelope.event.kind_name(),
                    "captured"
                );
                outcome
            }
            Err(err) => self.drop_event(Some(session_id), DropReason::Abandoned(err.to_string())),
        }
    }

    fn drop_event(&self, session_id: Option<&str>, reason: DropReason) -> CaptureOutcome {
        if reason.is_noteworthy() {
            tracing::warn!(session = session_id, reason = ?reason, "event dropped");
            if let Some(log) = self.diagnostics {
                let message = match &reason {
                    DropReason::Malformed(m) | DropReason::Abandoned(m) => m.clone(),
                    DropReason::Unknown => "unknown event kind".to_string(),
                    DropReason::MissingField(f) => format!("empty field `{f}`"),
                    DropReason::Ignored(name) => name.clone(),
                };
                let event = match reason {
                    DropReason::Abandoned(_) => "abandoned",
                    _ => "dropped",
                };
                let mut diagnostic = Diagnostic::new(COMPONENT, event, message);
                if let Some(id) = session_id {
                    diagnostic = diagnostic.with_session(id);
                }
                log.record(&diagnostic);
            }
        } else {
            tracing::trace!(session = session_id, reason = ?reason, "event ignored");
        }
        CaptureOutcome::Dropped(reason)
    }
}
