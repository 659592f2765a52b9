//! Lifecycle event shapes accepted on the hook path
//!
//! Two wire forms are understood: the canonical `{"kind": ...}` envelope and
//! the host's native hook payload (`hook_event_name`, `tool_name`, ...). Both
//! are classified into the same closed [`HookEvent`] set.

use recall_core::PromptSource;
use serde::Deserialize;
use serde_json::Value;

/// One event plus the context every kind shares
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub session_id: Option<String>,
    /// Host working directory; relative paths resolve against it
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(flatten)]
    pub event: HookEvent,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HookEvent {
    Command {
        #[serde(alias = "command")]
        text: String,
        #[serde(default)]
        exit_code: Option<i64>,
        /// Error output; only kept when the command failed
        #[serde(default, alias = "stderr")]
        error: Option<String>,
    },
    FileRead {
        #[serde(alias = "file_path")]
        path: String,
    },
    FileWrite {
        #[serde(alias = "file_path")]
        path: String,
        /// Accepted for shape compatibility, never stored
        #[serde(default)]
        content: Option<String>,
    },
    FileEdit {
        #[serde(alias = "file_path")]
        path: String,
        #[serde(default)]
        old_string: Option<String>,
        #[serde(default)]
        new_string: Option<String>,
        #[serde(default)]
        edits: Option<usize>,
    },
    Search {
        #[serde(alias = "query")]
        pattern: String,
        #[serde(default)]
        path: Option<String>,
    },
    Failure {
        text: String,
        #[serde(default)]
        error: Option<String>,
        #[serde(default, alias = "file_path")]
        path: Option<String>,
    },
    Decision {
        text: String,
    },
    Prompt {
        #[serde(alias = "prompt")]
        text: String,
        #[serde(default = "default_source")]
        source: PromptSource,
    },
    SessionStart,
    SessionEnd {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Host events with nothing to record
    Ignored {
        #[serde(default)]
        name: String,
    },
    #[serde(other)]
    Unknown,
}

fn default_source() -> PromptSource {
    PromptSource::User
}

impl HookEvent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            HookEvent::Command { .. } => "command",
            HookEvent::FileRead { .. } => "file_read",
            HookEvent::FileWrite { .. } => "file_write",
            HookEvent::FileEdit { .. } => "file_edit",
            HookEvent::Search { .. } => "search",
            HookEvent::Failure { .. } => "failure",
            HookEvent::Decision { .. } => "decision",
            HookEvent::Prompt { .. } => "prompt",
            HookEvent::SessionStart => "session_start",
            HookEvent::SessionEnd { .. } => "session_end",
            HookEvent::Ignored { .. } => "ignored",
            HookEvent::Unknown => "unknown",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("payload is not JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("payload has neither `kind` nor `hook_event_name`")]
    Unrecognized,
    #[error("`{kind}` payload is malformed: {message}")]
    Malformed { kind: String, message: String },
}

/// Classify one raw payload
pub fn parse_event(raw: &str) -> Result<EventEnvelope, ParseError> {
    let value: Value = serde_json::from_str(raw)?;
    parse_value(value)
}

pub fn parse_value(value: Value) -> Result<EventEnvelope, ParseError> {
    if value.get("hook_event_name").is_some() {
        return Ok(from_native(&value));
    }
    let Some(kind) = value.get("kind").and_then(Value::as_str).map(str::to_string) else {
        return Err(ParseError::Unrecognized);
    };
    serde_json::from_value(value).map_err(|e| ParseError::Malformed {
        kind,
        message: e.to_string(),
    })
}

fn str_field<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a str> {
    value.and_then(|v| v.get(key)).and_then(Value::as_str)
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// Did the tool report failure? Hosts differ in how they say so.
fn tool_failed(event_name: &str, response: Option<&Value>) -> bool {
    if event_name == "PostToolUseFailure" {
        return true;
    }
    let Some(response) = response else {
        return false;
    };
    if response.get("is_error").and_then(Value::as_bool) == Some(true)
        || response.get("success").and_then(Value::as_bool) == Some(false)
        || response.get("interrupted").and_then(Value::as_bool) == Some(true)
    {
        return true;
    }
    for key in ["exit_code", "exitCode", "returnCode"] {
        if let Some(code) = response.get(key).and_then(Value::as_i64) {
            return code != 0;
        }
    }
    response.get("error").is_some_and(|e| !e.is_null())
}

fn error_text(response: Option<&Value>) -> Option<String> {
    let response = response?;
    if let Some(text) = response.as_str() {
        return Some(text.to_string());
    }
    for key in ["error", "stderr", "message", "output"] {
        if let Some(text) = response.get(key).and_then(Value::as_str) {
            if !text.trim().is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

fn exit_code(response: Option<&Value>) -> Option<i64> {
    let response = response?;
    ["exit_code", "exitCode", "returnCode"]
        .iter()
        .find_map(|key| response.get(*key).and_then(Value::as_i64))
}

/// Map the host's native hook payload onto the closed event set
fn from_native(value: &Value) -> EventEnvelope {
    let event_name = value
        .get("hook_event_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let tool = value.get("tool_name").and_then(Value::as_str).unwrap_or_default();
    let input = value.get("tool_input");
    let response = value.get("tool_response");

    let event = match event_name {
        "UserPromptSubmit" => match value.get("prompt").and_then(Value::as_str) {
            Some(text) => HookEvent::Prompt {
                text: text.to_string(),
                source: PromptSource::User,
            },
            None => HookEvent::Unknown,
        },
        "SessionStart" => HookEvent::SessionStart,
        "SessionEnd" | "Stop" => HookEvent::SessionEnd {
            reason: owned(value.get("reason").and_then(Value::as_str))
                .or_else(|| Some(event_name.to_lowercase())),
        },
        "PostToolUse" | "PostToolUseFailure" => {
            from_native_tool(event_name, tool, input, response)
        }
        other => HookEvent::Ignored {
            name: other.to_string(),
        },
    };

    EventEnvelope {
        session_id: owned(value.get("session_id").and_then(Value::as_str)),
        cwd: owned(value.get("cwd").and_then(Value::as_str)),
        event,
    }
}

fn from_native_tool(
    event_name: &str,
    tool: &str,
    input: Option<&Value>,
    response: Option<&Value>,
) -> HookEvent {
    let failed = tool_failed(event_name, response);
    let file_path = owned(str_field(input, "file_path").or_else(|| str_field(input, "notebook_path")));

    match tool {
        "Bash" => match str_field(input, "command") {
            Some(command) => HookEvent::Command {
                text: command.to_string(),
                exit_code: exit_code(response),
                error: if failed { error_text(response) } else { None },
            },
            None => HookEvent::Unknown,
        },
        _ if failed => HookEvent::Failure {
            text: match &file_path {
                Some(path) => format!("{tool} {path}"),
                None => tool.to_string(),
            },
            error: error_text(response),
            path: file_path,
        },
        "Read" | "NotebookRead" => match file_path {
            Some(path) => HookEvent::FileRead { path },
            None => HookEvent::Unknown,
        },
        "Write" => match file_path {
            Some(path) => HookEvent::FileWrite {
                path,
                content: None,
            },
            None => HookEvent::Unknown,
        },
        "Edit" | "NotebookEdit" => match file_path {
            Some(path) => HookEvent::FileEdit {
                path,
                old_string: owned(str_field(input, "old_string")),
                new_string: owned(
                    str_field(input, "new_string").or_else(|| str_field(input, "new_source")),
                ),
                edits: Some(1),
            },
            None => HookEvent::Unknown,
        },
        "MultiEdit" => {
            let edits = input.and_then(|i| i.get("edits")).and_then(Value::as_array);
            let first = edits.and_then(|e| e.first());
            match file_path {
                Some(path) => HookEvent::FileEdit {
                    path,
                    old_string: owned(str_field(first, "old_string")),
                    new_string: owned(str_field(first, "new_string")),
                    edits: edits.map(Vec::len),
                },
                None => HookEvent::Unknown,
            }
        }
        "Grep" | "Glob" => match str_field(input, "pattern") {
            Some(pattern) => HookEvent::Search {
                pattern: pattern.to_string(),
                path: owned(str_field(input, "path")),
            },
            None => HookEvent::Unknown,
        },
        "ExitPlanMode" => match str_field(input, "plan") {
            Some(plan) => HookEvent::Decision {
                text: plan.to_string(),
            },
            None => HookEvent::Unknown,
        },
        "Task" => match str_field(input, "prompt").or_else(|| str_field(input, "description")) {
            Some(prompt) => HookEvent::Prompt {
                text: prompt.to_string(),
                source: PromptSource::Agent,
            },
            None => HookEvent::Unknown,
        },
        other => HookEvent::Ignored {
            name: format!("tool:{other}"),
        },
    }
}
