//! Core data model: sessions, prompts, observations, summaries

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Session id used when the host does not supply one
pub const DEFAULT_SESSION_ID: &str = "default";

/// Who issued a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    User,
    Agent,
}

impl PromptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptSource::User => "user",
            PromptSource::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(PromptSource::User),
            "agent" => Some(PromptSource::Agent),
            _ => None,
        }
    }
}

/// Closed set of observation kinds. The store's CHECK constraint mirrors it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Command,
    FileRead,
    FileWrite,
    FileEdit,
    Search,
    Failure,
    Decision,
}

impl ObservationKind {
    pub const ALL: [ObservationKind; 7] = [
        ObservationKind::Command,
        ObservationKind::FileRead,
        ObservationKind::FileWrite,
        ObservationKind::FileEdit,
        ObservationKind::Search,
        ObservationKind::Failure,
        ObservationKind::Decision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationKind::Command => "command",
            ObservationKind::FileRead => "file_read",
            ObservationKind::FileWrite => "file_write",
            ObservationKind::FileEdit => "file_edit",
            ObservationKind::Search => "search",
            ObservationKind::Failure => "failure",
            ObservationKind::Decision => "decision",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Kinds that change the working tree
    pub fn is_write(&self) -> bool {
        matches!(self, ObservationKind::FileWrite | ObservationKind::FileEdit)
    }
}

/// One continuous interaction with the host agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Consecutive failed summary attempts since the last success
    #[serde(default)]
    pub summary_failures: u32,
}

/// A directive issued within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: i64,
    pub session_id: String,
    pub source: PromptSource,
    pub ordinal: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted fact derived from one tool invocation or event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub session_id: String,
    pub prompt_id: Option<i64>,
    pub kind: ObservationKind,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Observation {
    /// File path recorded in the metadata, if the kind carries one
    pub fn file_path(&self) -> Option<&str> {
        self.metadata.get("file_path").and_then(|v| v.as_str())
    }
}

/// Observation fields supplied by capture. The owning prompt is resolved by
/// the store at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub session_id: String,
    pub kind: ObservationKind,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Compressed narrative residue of a closed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub session_id: String,
    pub intent: String,
    #[serde(default)]
    pub learned: Vec<String>,
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub notable_failures: Vec<String>,
    /// Files the session touched; the join key for retrieval
    #[serde(default)]
    pub files: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Fixed-width RFC 3339 so lexical order in the store equals time order
pub fn db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Make `path` absolute against `cwd` and drop `.` / `..` segments
pub fn normalize_path(path: &str, cwd: Option<&str>) -> String {
    let raw = Path::new(path);
    let joined = match cwd {
        Some(cwd) if raw.is_relative() => Path::new(cwd).join(raw),
        _ => raw.to_path_buf(),
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip_through_str() {
        for kind in ObservationKind::ALL {
            assert_eq!(ObservationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ObservationKind::parse("telemetry"), None);
    }

    #[test]
    fn test_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&ObservationKind::FileEdit).unwrap();
        assert_eq!(json, "\"file_edit\"");
    }

    #[test]
    fn test_prompt_source_parse() {
        assert_eq!(PromptSource::parse("agent"), Some(PromptSource::Agent));
        assert_eq!(PromptSource::parse("system"), None);
    }

    #[test]
    fn test_db_time_sorts_lexically() {
        let a: DateTime<Utc> = "2025-01-01T00:00:09Z".parse().unwrap();
        let b: DateTime<Utc> = "2025-01-01T00:00:10.5Z".parse().unwrap();
        assert!(db_time(&a) < db_time(&b));
        assert_eq!(db_time(&a).parse::<DateTime<Utc>>().unwrap(), a);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("src/./lib.rs", Some("/work/repo")),
            "/work/repo/src/lib.rs"
        );
        assert_eq!(
            normalize_path("../other/main.rs", Some("/work/repo")),
            "/work/other/main.rs"
        );
        assert_eq!(normalize_path("/abs/file.rs", Some("/ignored")), "/abs/file.rs");
        assert_eq!(normalize_path("rel.rs", None), "rel.rs");
    }

    #[test]
    fn test_observation_file_path() {
        let obs = Observation {
            id: 1,
            session_id: "s".to_string(),
            prompt_id: None,
            kind: ObservationKind::FileRead,
            content: "read /a.rs".to_string(),
            metadata: serde_json::json!({"file_path": "/a.rs"}),
            created_at: Utc::now(),
        };
        assert_eq!(obs.file_path(), Some("/a.rs"));
    }
}
