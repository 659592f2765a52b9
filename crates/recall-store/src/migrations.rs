//! Append-only schema migrations tracked by `PRAGMA user_version`
//!
//! Entry `i` upgrades the store from version `i` to `i + 1`. Released entries
//! are never edited or reordered; schema changes go in a new entry at the end.

use crate::error::{Result, StorageError};
use rusqlite::{Connection, TransactionBehavior};

pub const MIGRATIONS: &[&str] = &[
    // 1: sessions, prompts, observations
    "
    CREATE TABLE sessions (
        id          TEXT PRIMARY KEY,
        project     TEXT,
        started_at  TEXT NOT NULL,
        ended_at    TEXT
    );

    CREATE TABLE prompts (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        source      TEXT NOT NULL CHECK (source IN ('user', 'agent')),
        ordinal     INTEGER NOT NULL,
        text        TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        UNIQUE (session_id, ordinal),
        UNIQUE (id, session_id)
    );

    CREATE TABLE observations (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        prompt_id   INTEGER,
        kind        TEXT NOT NULL CHECK (kind IN (
                        'command', 'file_read', 'file_write', 'file_edit',
                        'search', 'failure', 'decision')),
        content     TEXT NOT NULL,
        metadata    TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(metadata)),
        created_at  TEXT NOT NULL,
        FOREIGN KEY (prompt_id, session_id) REFERENCES prompts(id, session_id)
    );

    CREATE INDEX idx_prompts_session ON prompts(session_id, ordinal);
    CREATE INDEX idx_observations_session ON observations(session_id, created_at, id);
    CREATE INDEX idx_observations_prompt ON observations(prompt_id, session_id);
    CREATE INDEX idx_observations_created ON observations(created_at);
    ",
    // 2: full-text index over observation content
    "
    CREATE VIRTUAL TABLE observations_fts USING fts5(
        content,
        content='observations',
        content_rowid='id',
        tokenize='porter unicode61'
    );

    CREATE TRIGGER observations_ai AFTER INSERT ON observations BEGIN
        INSERT INTO observations_fts(rowid, content) VALUES (new.id, new.content);
    END;

    CREATE TRIGGER observations_ad AFTER DELETE ON observations BEGIN
        INSERT INTO observations_fts(observations_fts, rowid, content)
        VALUES ('delete', old.id, old.content);
    END;

    CREATE TRIGGER observations_au AFTER UPDATE OF content ON observations BEGIN
        INSERT INTO observations_fts(observations_fts, rowid, content)
        VALUES ('delete', old.id, old.content);
        INSERT INTO observations_fts(rowid, content) VALUES (new.id, new.content);
    END;

    INSERT INTO observations_fts(observations_fts) VALUES ('rebuild');
    ",
    // 3: summaries, the files they touched, and their full-text index
    "
    CREATE TABLE summaries (
        session_id        TEXT PRIMARY KEY REFERENCES sessions(id) ON DELETE CASCADE,
        intent            TEXT NOT NULL,
        learned           TEXT NOT NULL DEFAULT '[]',
        completed         TEXT NOT NULL DEFAULT '[]',
        next_steps        TEXT NOT NULL DEFAULT '[]',
        notable_failures  TEXT NOT NULL DEFAULT '[]',
        body              TEXT NOT NULL,
        created_at        TEXT NOT NULL
    );

    CREATE TABLE summary_files (
        session_id  TEXT NOT NULL REFERENCES summaries(session_id) ON DELETE CASCADE,
        path        TEXT NOT NULL,
        touches     INTEGER NOT NULL DEFAULT 1,
        PRIMARY KEY (session_id, path)
    );

    CREATE INDEX idx_summary_files_path ON summary_files(path);
    CREATE INDEX idx_summaries_created ON summaries(created_at);

    CREATE VIRTUAL TABLE summaries_fts USING fts5(
        intent,
        body,
        content='summaries',
        tokenize='porter unicode61'
    );

    CREATE TRIGGER summaries_ai AFTER INSERT ON summaries BEGIN
        INSERT INTO summaries_fts(rowid, intent, body) VALUES (new.rowid, new.intent, new.body);
    END;

    CREATE TRIGGER summaries_ad AFTER DELETE ON summaries BEGIN
        INSERT INTO summaries_fts(summaries_fts, rowid, intent, body)
        VALUES ('delete', old.rowid, old.intent, old.body);
    END;

    CREATE TRIGGER summaries_au AFTER UPDATE ON summaries BEGIN
        INSERT INTO summaries_fts(summaries_fts, rowid, intent, body)
        VALUES ('delete', old.rowid, old.intent, old.body);
        INSERT INTO summaries_fts(rowid, intent, body) VALUES (new.rowid, new.intent, new.body);
    END;
    ",
    // 4: pinned observations
    "
    CREATE TABLE pins (
        observation_id  INTEGER PRIMARY KEY REFERENCES observations(id) ON DELETE CASCADE,
        note            TEXT,
        created_at      TEXT NOT NULL
    );
    ",
    // 5: failed summary attempts and when the next one may run
    "
    ALTER TABLE sessions ADD COLUMN summary_failures INTEGER NOT NULL DEFAULT 0;
    ALTER TABLE sessions ADD COLUMN summary_retry_after TEXT;
    ",
];

/// Version a fully migrated store reports
pub fn latest_version() -> usize {
    MIGRATIONS.len()
}

/// Current `user_version` of an open store
pub fn schema_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version.max(0) as usize)
}

/// Bring the store to the latest version. Returns the number of migrations applied.
pub fn migrate(conn: &mut Connection) -> Result<usize> {
    apply(conn, MIGRATIONS)
}

/// All pending entries run in one transaction: either every one lands and
/// `user_version` moves, or none do.
pub(crate) fn apply(conn: &mut Connection, migrations: &[&str]) -> Result<usize> {
    let current = schema_version(conn)?;
    if current > migrations.len() {
        return Err(StorageError::SchemaTooNew {
            found: current,
            supported: migrations.len(),
        });
    }
    if current == migrations.len() {
        return Ok(0);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for (idx, sql) in migrations.iter().enumerate().skip(current) {
        let version = idx + 1;
        tx.execute_batch(sql)
            .map_err(|source| StorageError::Migration { version, source })?;
        tracing::debug!(version, "applied store migration");
    }
    tx.pragma_update(None, "user_version", migrations.len() as i64)?;
    tx.commit()?;

    let applied = migrations.len() - current;
    tracing::info!(from = current, to = migrations.len(), "store schema migrated");
    Ok(applied)
}
