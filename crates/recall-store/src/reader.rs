//! Read-only connections: lookups, the retrieval join queries and full-text search

use crate::error::Result;
use crate::rows::{self, OBSERVATION_COLUMNS, PROMPT_COLUMNS, SESSION_COLUMNS, SUMMARY_COLUMNS};
use crate::store::{apply_key, first_read};
use chrono::{DateTime, Utc};
use recall_core::{db_time, Observation, ObservationKind, Prompt, Session, Summary};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Relative weight of a summary hit against an observation hit
const SUMMARY_SOURCE_WEIGHT: f64 = 2.0;
/// Per-column bm25 weights for summaries_fts (intent, body)
const SUMMARY_INTENT_WEIGHT: f64 = 3.0;
const SUMMARY_BODY_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Observation,
    Summary,
}

/// One full-text match. Higher `score` is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub source: HitSource,
    /// Observation id, or the summary's row id
    pub id: i64,
    pub session_id: String,
    pub text: String,
    pub score: f64,
}

/// A past summary with its overlap against the current hot file set
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryCandidate {
    pub summary: Summary,
    pub project: Option<String>,
    /// Number of the hot files this summary's session touched
    pub overlap: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PinnedObservation {
    pub observation: Observation,
    pub note: Option<String>,
    pub pinned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub sessions: u64,
    pub prompts: u64,
    pub observations: u64,
    pub summaries: u64,
    pub pins: u64,
}

pub struct Reader {
    conn: Connection,
}

impl Reader {
    pub fn open(path: &Path, key: Option<&str>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        apply_key(&conn, key)?;
        first_read(&conn, key.is_some())?;
        // Only WAL recovery or a checkpoint can make a reader wait
        conn.busy_timeout(Duration::from_millis(100))?;
        Ok(Self { conn })
    }

    pub fn session(&self, id: &str) -> Result<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        Ok(self.conn.query_row(&sql, [id], rows::session).optional()?)
    }

    pub fn observation(&self, id: i64) -> Result<Option<Observation>> {
        let sql = format!("SELECT {OBSERVATION_COLUMNS} FROM observations o WHERE o.id = ?1");
        Ok(self.conn.query_row(&sql, [id], rows::observation).optional()?)
    }

    /// Directives of a session in ordinal order
    pub fn session_prompts(&self, session_id: &str) -> Result<Vec<Prompt>> {
        let sql = format!(
            "SELECT {PROMPT_COLUMNS} FROM prompts WHERE session_id = ?1 ORDER BY ordinal"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([session_id], rows::prompt)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Observations of a session in causal order
    pub fn session_observations(&self, session_id: &str) -> Result<Vec<Observation>> {
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations o
             WHERE o.session_id = ?1 ORDER BY o.created_at, o.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([session_id], rows::observation)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Observations of a session created at or after `since`, oldest first
    pub fn observations_since(
        &self,
        session_id: &str,
        since: &DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations o
             WHERE o.session_id = ?1 AND o.created_at >= ?2
             ORDER BY o.created_at, o.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![session_id, db_time(since)], rows::observation)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn latest_prompt(&self, session_id: &str) -> Result<Option<Prompt>> {
        let sql = format!(
            "SELECT {PROMPT_COLUMNS} FROM prompts WHERE session_id = ?1
             ORDER BY ordinal DESC LIMIT 1"
        );
        Ok(self.conn.query_row(&sql, [session_id], rows::prompt).optional()?)
    }

    pub fn summary(&self, session_id: &str) -> Result<Option<Summary>> {
        let sql = format!("SELECT {SUMMARY_COLUMNS} FROM summaries s WHERE s.session_id = ?1");
        let summary = self.conn.query_row(&sql, [session_id], rows::summary).optional()?;
        match summary {
            Some(mut summary) => {
                summary.files = self.summary_files(session_id)?;
                Ok(Some(summary))
            }
            None => Ok(None),
        }
    }

    fn summary_files(&self, session_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT path FROM summary_files WHERE session_id = ?1 ORDER BY touches DESC, path",
        )?;
        let rows = stmt.query_map([session_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Past summaries joined against the hot file set: the macro side of
    /// retrieval. Ordered by overlap, then recency. Sessions from another
    /// project are excluded when `project` is given.
    pub fn summary_candidates(
        &self,
        hot_files: &[String],
        project: Option<&str>,
        exclude_session: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SummaryCandidate>> {
        let hot = serde_json::to_string(hot_files)?;
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS}, ss.project,
                    (SELECT COUNT(*) FROM summary_files f
                      WHERE f.session_id = s.session_id
                        AND f.path IN (SELECT value FROM json_each(?1))) AS overlap
             FROM summaries s
             JOIN sessions ss ON ss.id = s.session_id
             WHERE (?2 IS NULL OR s.session_id != ?2)
               AND (?3 IS NULL OR ss.project IS NULL OR ss.project = ?3)
             ORDER BY overlap DESC, s.created_at DESC
             LIMIT ?4"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![hot, exclude_session, project, limit as i64],
            |row| {
                let summary = rows::summary(row)?;
                let project: Option<String> = row.get(7)?;
                let overlap: i64 = row.get(8)?;
                Ok(SummaryCandidate {
                    summary,
                    project,
                    overlap: overlap.max(0) as usize,
                })
            },
        )?;

        let mut candidates = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        for candidate in &mut candidates {
            candidate.summary.files = self.summary_files(&candidate.summary.session_id)?;
        }
        Ok(candidates)
    }

    /// Most recent summaries regardless of overlap
    pub fn recent_summaries(&self, limit: usize) -> Result<Vec<Summary>> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM summaries s ORDER BY s.created_at DESC LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([limit as i64], rows::summary)?;
        let mut summaries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        for summary in &mut summaries {
            summary.files = self.summary_files(&summary.session_id)?;
        }
        Ok(summaries)
    }

    /// Earlier observations of the given kinds whose file is in `files`
    pub fn file_matches(
        &self,
        files: &[String],
        kinds: &[ObservationKind],
        exclude_session: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Observation>> {
        if files.is_empty() || kinds.is_empty() {
            return Ok(Vec::new());
        }
        let files = serde_json::to_string(files)?;
        let kinds = serde_json::to_string(&kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>())?;
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations o
             WHERE json_extract(o.metadata, '$.file_path') IN (SELECT value FROM json_each(?1))
               AND o.kind IN (SELECT value FROM json_each(?2))
               AND (?3 IS NULL OR o.session_id != ?3)
             ORDER BY o.created_at DESC, o.id DESC
             LIMIT ?4"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![files, kinds, exclude_session, limit as i64],
            rows::observation,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Pinned observations, newest pin first
    pub fn pinned(&self, limit: usize) -> Result<Vec<PinnedObservation>> {
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS}, p.note, p.created_at
             FROM pins p JOIN observations o ON o.id = p.observation_id
             ORDER BY p.created_at DESC, o.id DESC
             LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(PinnedObservation {
                observation: rows::observation(row)?,
                note: row.get(7)?,
                pinned_at: rows::time_at(row, 8)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Full-text search over observations and summaries, best first.
    /// A query with no searchable terms returns nothing.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let Some(fts_query) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT 'observation', o.id, o.session_id, o.content,
                    bm25(observations_fts) AS weighted
             FROM observations_fts
             JOIN observations o ON o.id = observations_fts.rowid
             WHERE observations_fts MATCH ?1
             UNION ALL
             SELECT 'summary', s.rowid, s.session_id, s.intent || char(10) || s.body,
                    bm25(summaries_fts, ?2, ?3) * ?4 AS weighted
             FROM summaries_fts
             JOIN summaries s ON s.rowid = summaries_fts.rowid
             WHERE summaries_fts MATCH ?1
             ORDER BY weighted
             LIMIT ?5",
        )?;
        let rows = stmt.query_map(
            params![
                fts_query,
                SUMMARY_INTENT_WEIGHT,
                SUMMARY_BODY_WEIGHT,
                SUMMARY_SOURCE_WEIGHT,
                limit as i64
            ],
            |row| {
                let source: String = row.get(0)?;
                let rank: f64 = row.get(4)?;
                Ok(SearchHit {
                    source: if source == "summary" {
                        HitSource::Summary
                    } else {
                        HitSource::Observation
                    },
                    id: row.get(1)?,
                    session_id: row.get(2)?,
                    text: row.get(3)?,
                    // bm25 is lower-is-better
                    score: -rank,
                })
            },
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Raw index lookup without joining back to the content table. Stale
    /// entries left by a broken trigger show up here even though `search`
    /// filters them out.
    pub fn indexed_observation_ids(&self, query: &str) -> Result<Vec<i64>> {
        let Some(fts_query) = fts_query(query) else {
            return Ok(Vec::new());
        };
        let mut stmt = self.conn.prepare(
            "SELECT rowid FROM observations_fts WHERE observations_fts MATCH ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map([fts_query], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<i64>>>()?)
    }

    /// Closed sessions with recorded activity whose summary is missing or
    /// older than their last end marker. Sessions still backing off after a
    /// failed attempt are skipped; the rest come fewest failures first, then
    /// oldest first.
    pub fn sessions_pending_summary(&self, limit: usize) -> Result<Vec<Session>> {
        self.sessions_pending_summary_at(limit, Utc::now())
    }

    pub fn sessions_pending_summary_at(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ss
             WHERE ss.ended_at IS NOT NULL
               AND NOT EXISTS (SELECT 1 FROM summaries s
                                WHERE s.session_id = ss.id AND s.created_at >= ss.ended_at)
               AND (EXISTS (SELECT 1 FROM observations o WHERE o.session_id = ss.id)
                    OR EXISTS (SELECT 1 FROM prompts p WHERE p.session_id = ss.id))
               AND (ss.summary_retry_after IS NULL OR ss.summary_retry_after <= ?2)
             ORDER BY ss.summary_failures, ss.ended_at, ss.id
             LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64, db_time(&now)], rows::session)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn counts(&self) -> Result<Counts> {
        Ok(self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM sessions),
                    (SELECT COUNT(*) FROM prompts),
                    (SELECT COUNT(*) FROM observations),
                    (SELECT COUNT(*) FROM summaries),
                    (SELECT COUNT(*) FROM pins)",
            [],
            |row| {
                Ok(Counts {
                    sessions: row.get::<_, i64>(0)? as u64,
                    prompts: row.get::<_, i64>(1)? as u64,
                    observations: row.get::<_, i64>(2)? as u64,
                    summaries: row.get::<_, i64>(3)? as u64,
                    pins: row.get::<_, i64>(4)? as u64,
                })
            },
        )?)
    }
}

/// Turn free text into an FTS5 OR-query of quoted terms. Quoting keeps
/// operators and punctuation in user text from being parsed as syntax.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}
