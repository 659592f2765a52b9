//! Row decoding shared by the reader and maintenance paths

use chrono::{DateTime, Utc};
use recall_core::{Observation, ObservationKind, Prompt, PromptSource, Session, Summary};
use rusqlite::types::Type;
use rusqlite::Row;

fn invalid(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

pub(crate) fn time_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| invalid(idx, format!("bad timestamp {raw:?}: {e}")))
}

fn opt_time_at(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(_) => time_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn json_at<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| invalid(idx, format!("bad json: {e}")))
}

pub(crate) const SESSION_COLUMNS: &str = "id, project, started_at, ended_at, summary_failures";

pub(crate) fn session(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        project: row.get(1)?,
        started_at: time_at(row, 2)?,
        ended_at: opt_time_at(row, 3)?,
        summary_failures: row.get(4)?,
    })
}

pub(crate) const PROMPT_COLUMNS: &str = "id, session_id, source, ordinal, text, created_at";

pub(crate) fn prompt(row: &Row) -> rusqlite::Result<Prompt> {
    let source: String = row.get(2)?;
    Ok(Prompt {
        id: row.get(0)?,
        session_id: row.get(1)?,
        source: PromptSource::parse(&source)
            .ok_or_else(|| invalid(2, format!("unknown prompt source {source:?}")))?,
        ordinal: row.get(3)?,
        text: row.get(4)?,
        created_at: time_at(row, 5)?,
    })
}

pub(crate) const OBSERVATION_COLUMNS: &str =
    "o.id, o.session_id, o.prompt_id, o.kind, o.content, o.metadata, o.created_at";

pub(crate) fn observation(row: &Row) -> rusqlite::Result<Observation> {
    let kind: String = row.get(3)?;
    Ok(Observation {
        id: row.get(0)?,
        session_id: row.get(1)?,
        prompt_id: row.get(2)?,
        kind: ObservationKind::parse(&kind)
            .ok_or_else(|| invalid(3, format!("unknown observation kind {kind:?}")))?,
        content: row.get(4)?,
        metadata: json_at(row, 5)?,
        created_at: time_at(row, 6)?,
    })
}

pub(crate) const SUMMARY_COLUMNS: &str =
    "s.session_id, s.intent, s.learned, s.completed, s.next_steps, s.notable_failures, s.created_at";

/// Files are stored in `summary_files` and attached by the caller
pub(crate) fn summary(row: &Row) -> rusqlite::Result<Summary> {
    Ok(Summary {
        session_id: row.get(0)?,
        intent: row.get(1)?,
        learned: json_at(row, 2)?,
        completed: json_at(row, 3)?,
        next_steps: json_at(row, 4)?,
        notable_failures: json_at(row, 5)?,
        files: Vec::new(),
        created_at: time_at(row, 6)?,
    })
}

/// Flattened narrative indexed next to the intent
pub(crate) fn summary_body(summary: &Summary) -> String {
    let mut body = String::new();
    let sections: [(&str, &[String]); 4] = [
        ("Learned", &summary.learned),
        ("Completed", &summary.completed),
        ("Next steps", &summary.next_steps),
        ("Failures", &summary.notable_failures),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        body.push_str(title);
        body.push_str(":\n");
        for item in items {
            body.push_str("- ");
            body.push_str(item);
            body.push('\n');
        }
    }
    for file in &summary.files {
        body.push_str(file);
        body.push('\n');
    }
    body
}
