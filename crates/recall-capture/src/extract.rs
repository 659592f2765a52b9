//! Minimal field extraction per event kind. Success output and written file
//! bodies are never kept; failures keep their (bounded) error text.

use crate::event::HookEvent;
use recall_core::{normalize_path, CaptureConfig, ObservationKind, PromptSource};
use recall_redact::redactor;
use serde_json::{json, Map, Value};

/// What one event turns into
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Observe {
        kind: ObservationKind,
        content: String,
        metadata: Value,
    },
    Prompt {
        source: PromptSource,
        text: String,
    },
    SessionStart,
    SessionEnd,
    Drop(Skip),
}

/// Why an event produced nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// Host event with nothing worth recording
    Ignored(String),
    Unknown,
    /// A required field was present but empty
    Empty(&'static str),
}

/// Cut `text` to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => {
            let mut out = text[..idx].to_string();
            out.push('…');
            out
        }
        None => text.to_string(),
    }
}

fn clean(text: &str) -> String {
    redactor().redact(text).0.into_owned()
}

fn path(raw: &str, cwd: Option<&str>) -> String {
    clean(&normalize_path(raw, cwd))
}

/// Classify and extract. Every text field is redacted independently.
pub fn extract(event: &HookEvent, cwd: Option<&str>, config: &CaptureConfig) -> Action {
    match event {
        HookEvent::Command {
            text,
            exit_code,
            error,
        } => {
            let command = text.trim();
            if command.is_empty() {
                return Action::Drop(Skip::Empty("text"));
            }
            let command = clean(command);
            let failed = exit_code.is_some_and(|c| c != 0) || error.is_some();

            let mut metadata = Map::new();
            metadata.insert("command".to_string(), json!(command));
            if let Some(code) = exit_code {
                metadata.insert("exit_code".to_string(), json!(code));
            }

            if failed {
                let detail = error
                    .as_deref()
                    .map(|e| clean(&truncate_chars(e.trim(), config.max_failure_chars)))
                    .filter(|e| !e.is_empty());
                let content = match &detail {
                    Some(detail) => format!("{command}\n{detail}"),
                    None => command.clone(),
                };
                if let Some(detail) = detail {
                    metadata.insert("error".to_string(), json!(detail));
                }
                Action::Observe {
                    kind: ObservationKind::Failure,
                    content,
                    metadata: Value::Object(metadata),
                }
            } else {
                Action::Observe {
                    kind: ObservationKind::Command,
                    content: command,
                    metadata: Value::Object(metadata),
                }
            }
        }

        HookEvent::FileRead { path: raw } => file_action(ObservationKind::FileRead, "read", raw, cwd, None),

        HookEvent::FileWrite { path: raw, content } => {
            let extra = content.as_ref().map(|c| ("bytes", json!(c.len())));
            file_action(ObservationKind::FileWrite, "wrote", raw, cwd, extra)
        }

        HookEvent::FileEdit {
            path: raw,
            old_string,
            new_string,
            edits,
        } => {
            if raw.trim().is_empty() {
                return Action::Drop(Skip::Empty("path"));
            }
            let file = path(raw, cwd);
            let excerpt = |s: &Option<String>| {
                s.as_deref()
                    .map(|s| clean(&truncate_chars(s, config.max_excerpt_chars)))
            };
            let mut metadata = Map::new();
            metadata.insert("file_path".to_string(), json!(file));
            if let Some(old) = excerpt(old_string) {
                metadata.insert("old".to_string(), json!(old));
            }
            if let Some(new) = excerpt(new_string) {
                metadata.insert("new".to_string(), json!(new));
            }
            if let Some(edits) = edits {
                metadata.insert("edits".to_string(), json!(edits));
            }
            Action::Observe {
                kind: ObservationKind::FileEdit,
                content: format!("edited {file}"),
                metadata: Value::Object(metadata),
            }
        }

        HookEvent::Search { pattern, path: scope } => {
            if pattern.trim().is_empty() {
                return Action::Drop(Skip::Empty("pattern"));
            }
            let pattern = clean(pattern);
            let scope = scope.as_deref().map(|s| path(s, cwd));
            let content = match &scope {
                Some(scope) => format!("search {pattern} in {scope}"),
                None => format!("search {pattern}"),
            };
            Action::Observe {
                kind: ObservationKind::Search,
                content,
                metadata: json!({ "pattern": pattern, "path": scope }),
            }
        }

        HookEvent::Failure {
            text,
            error,
            path: raw,
        } => {
            if text.trim().is_empty() && error.as_deref().map_or(true, |e| e.trim().is_empty()) {
                return Action::Drop(Skip::Empty("text"));
            }
            let subject = clean(text.trim());
            let detail = error
                .as_deref()
                .map(|e| clean(&truncate_chars(e.trim(), config.max_failure_chars)))
                .filter(|e| !e.is_empty());
            let mut metadata = Map::new();
            if let Some(raw) = raw {
                metadata.insert("file_path".to_string(), json!(path(raw, cwd)));
            }
            if let Some(detail) = &detail {
                metadata.insert("error".to_string(), json!(detail));
            }
            let content = match detail {
                Some(detail) if !subject.is_empty() => format!("{subject}\n{detail}"),
                Some(detail) => detail,
                None => subject,
            };
            Action::Observe {
                kind: ObservationKind::Failure,
                content,
                metadata: Value::Object(metadata),
            }
        }

        HookEvent::Decision { text } => {
            if text.trim().is_empty() {
                return Action::Drop(Skip::Empty("text"));
            }
            Action::Observe {
                kind: ObservationKind::Decision,
                content: clean(&truncate_chars(text.trim(), config.max_prompt_chars)),
                metadata: json!({}),
            }
        }

        HookEvent::Prompt { text, source } => {
            if text.trim().is_empty() {
                return Action::Drop(Skip::Empty("text"));
            }
            Action::Prompt {
                source: *source,
                text: clean(&truncate_chars(text.trim(), config.max_prompt_chars)),
            }
        }

        HookEvent::SessionStart => Action::SessionStart,
        HookEvent::SessionEnd { .. } => Action::SessionEnd,
        HookEvent::Ignored { name } => Action::Drop(Skip::Ignored(name.clone())),
        HookEvent::Unknown => Action::Drop(Skip::Unknown),
    }
}

fn file_action(
    kind: ObservationKind,
    verb: &str,
    raw: &str,
    cwd: Option<&str>,
    extra: Option<(&str, Value)>,
) -> Action {
    if raw.trim().is_empty() {
        return Action::Drop(Skip::Empty("path"));
    }
    let file = path(raw, cwd);
    let mut metadata = Map::new();
    metadata.insert("file_path".to_string(), json!(file));
    if let Some((key, value)) = extra {
        metadata.insert(key.to_string(), value);
    }
    Action::Observe {
        kind,
        content: format!("{verb} {file}"),
        metadata: Value::Object(metadata),
    }
}
