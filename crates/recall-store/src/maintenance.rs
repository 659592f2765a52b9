//! Explicit maintenance: health report, index compaction, integrity checks,
//! retention pruning and re-redaction. None of this runs on the hook path.

use crate::error::{Result, StorageError};
use crate::migrations;
use crate::reader::Counts;
use crate::store::Store;
use crate::writes;
use chrono::{DateTime, Utc};
use recall_core::db_time;
use recall_redact::redactor;
use rusqlite::{params, Connection, TransactionBehavior};
use serde::Serialize;
use std::path::PathBuf;

const FTS_TABLES: [&str; 2] = ["observations_fts", "summaries_fts"];

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub path: PathBuf,
    pub schema_version: usize,
    pub latest_version: usize,
    pub pending_migrations: usize,
    /// `PRAGMA quick_check` rows; `["ok"]` when healthy
    pub quick_check: Vec<String>,
    /// Failing full-text tables and the error each reported
    pub fts_errors: Vec<String>,
    pub counts: Counts,
    pub db_bytes: u64,
    pub wal_bytes: u64,
}

impl StoreStatus {
    pub fn is_healthy(&self) -> bool {
        self.pending_migrations == 0
            && self.quick_check.iter().all(|line| line == "ok")
            && self.fts_errors.is_empty()
    }
}

/// Which maintenance steps to run
#[derive(Debug, Clone)]
pub struct MaintenancePlan {
    pub optimize_fts: bool,
    pub integrity: bool,
    /// Delete observations older than this, for sessions that already have
    /// a summary. Pinned observations are kept.
    pub prune_before: Option<DateTime<Utc>>,
    /// Run stored text through the current redaction rules again
    pub reredact: bool,
    pub checkpoint: bool,
}

impl MaintenancePlan {
    pub fn new() -> Self {
        Self {
            optimize_fts: true,
            integrity: true,
            prune_before: None,
            reredact: false,
            checkpoint: true,
        }
    }
}

impl Default for MaintenancePlan {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub pruned: usize,
    pub reredacted: usize,
    pub fts_optimized: bool,
    /// Problems found by integrity checks; empty when clean
    pub integrity_errors: Vec<String>,
    pub checkpointed: bool,
}

impl MaintenanceReport {
    pub fn is_clean(&self) -> bool {
        self.integrity_errors.is_empty()
    }
}

impl Store {
    pub fn status(&self) -> Result<StoreStatus> {
        let (schema_version, quick_check, fts_errors) = self.with_writer(|conn| {
            let version = migrations::schema_version(conn)?;
            let quick = pragma_lines(conn, "PRAGMA quick_check")?;
            Ok((version, quick, fts_integrity(conn)))
        })?;
        let counts = self.reader()?.counts()?;

        let wal_path = {
            let mut os = self.path().as_os_str().to_owned();
            os.push("-wal");
            PathBuf::from(os)
        };

        Ok(StoreStatus {
            path: self.path().to_path_buf(),
            schema_version,
            latest_version: migrations::latest_version(),
            pending_migrations: migrations::latest_version().saturating_sub(schema_version),
            quick_check,
            fts_errors,
            counts,
            db_bytes: file_len(self.path()),
            wal_bytes: file_len(&wal_path),
        })
    }

    /// Run the steps in `plan`. Writers are blocked while it holds the lock.
    pub fn maintain(&self, plan: &MaintenancePlan) -> Result<MaintenanceReport> {
        let mut report = MaintenanceReport::default();

        if plan.reredact {
            report.reredacted = self.write(|tx| reredact(tx))?;
        }

        if let Some(cutoff) = plan.prune_before {
            report.pruned = self.write(|tx| prune(tx, &cutoff))?;
        }

        self.with_writer(|conn| {
            if plan.optimize_fts {
                for table in FTS_TABLES {
                    conn.execute(
                        &format!("INSERT INTO {table}({table}) VALUES ('optimize')"),
                        [],
                    )?;
                }
                report.fts_optimized = true;
            }

            if plan.integrity {
                let lines = pragma_lines(conn, "PRAGMA integrity_check")?;
                report
                    .integrity_errors
                    .extend(lines.into_iter().filter(|line| line != "ok"));
                report.integrity_errors.extend(fts_integrity(conn));
            }

            conn.execute_batch("PRAGMA optimize")?;

            if plan.checkpoint {
                let busy: i64 =
                    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| row.get(0))?;
                report.checkpointed = busy == 0;
            }
            Ok(())
        })?;

        tracing::info!(
            pruned = report.pruned,
            reredacted = report.reredacted,
            integrity_errors = report.integrity_errors.len(),
            checkpointed = report.checkpointed,
            "store maintenance finished"
        );
        Ok(report)
    }
}

fn file_len(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn pragma_lines(conn: &Connection, sql: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Compare each full-text index against its content table
fn fts_integrity(conn: &mut Connection) -> Vec<String> {
    let mut errors = Vec::new();
    for table in FTS_TABLES {
        // The check is issued as a write; run it in a transaction that is
        // never committed so nothing else is touched
        let result = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(StorageError::from)
            .and_then(|tx| {
                tx.execute(
                    &format!("INSERT INTO {table}({table}, rank) VALUES ('integrity-check', 1)"),
                    [],
                )
                .map_err(StorageError::from)
            });
        if let Err(e) = result {
            tracing::warn!(table, error = %e, "full-text index integrity check failed");
            errors.push(format!("{table}: {e}"));
        }
    }
    errors
}

/// Rewrite stored text that matches the current redaction rules
fn reredact(conn: &Connection) -> Result<usize> {
    let mut changed = 0;

    let observations: Vec<(i64, String, String)> = {
        let mut stmt = conn.prepare("SELECT id, content, metadata FROM observations")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    for (id, content, metadata) in observations {
        let (_, content_hit) = redactor().redact(&content);
        let mut meta: serde_json::Value = serde_json::from_str(&metadata)?;
        let meta_hit = writes::redact_json(&mut meta);
        if content_hit || meta_hit {
            writes::update_observation(conn, id, &content, Some(&meta))?;
            changed += 1;
        }
    }

    let prompts: Vec<(i64, String)> = {
        let mut stmt = conn.prepare("SELECT id, text FROM prompts")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    for (id, text) in prompts {
        let (clean, hit) = redactor().redact(&text);
        if hit {
            conn.execute("UPDATE prompts SET text = ?2 WHERE id = ?1", params![id, &*clean])?;
            changed += 1;
        }
    }

    if changed > 0 {
        tracing::info!(changed, "re-redacted stored rows");
    }
    Ok(changed)
}

fn prune(conn: &Connection, cutoff: &DateTime<Utc>) -> Result<usize> {
    let pruned = conn.execute(
        "DELETE FROM observations
         WHERE created_at < ?1
           AND session_id IN (SELECT session_id FROM summaries)
           AND id NOT IN (SELECT observation_id FROM pins)",
        [db_time(cutoff)],
    )?;
    if pruned > 0 {
        tracing::info!(pruned, cutoff = %db_time(cutoff), "pruned summarized observations");
    }
    Ok(pruned)
}
