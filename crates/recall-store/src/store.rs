//! Writer handle: one write-capable connection, serialized transactions,
//! bounded retry on contention from other processes

use crate::error::{Result, StorageError};
use crate::migrations;
use crate::reader::Reader;
use crate::writes;
use chrono::{DateTime, Utc};
use recall_core::{NewObservation, Observation, Prompt, PromptSource, StoreConfig, Summary};
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// How a store is opened and how hard writers retry
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Applied with `PRAGMA key` before any other statement
    pub key: Option<String>,
    /// Refuse to open without a key
    pub require_key: bool,
    pub busy_retries: u32,
    pub busy_backoff: Duration,
    pub max_backoff: Duration,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::from_config(&StoreConfig::new())
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            key: config.encryption_key(),
            require_key: config.encrypted,
            busy_retries: config.busy_retries.max(1),
            busy_backoff: Duration::from_millis(config.busy_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Store {
    path: PathBuf,
    options: StoreOptions,
    writer: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) and migrate the store at `path`
    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self> {
        let path = path.into();
        if options.require_key && !cfg!(feature = "encryption") {
            return Err(StorageError::EncryptionUnavailable);
        }
        if options.require_key && options.key.is_none() {
            return Err(StorageError::KeyMissing);
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(&path)?;
        // Tolerate a concurrent opener while the schema is settled
        conn.busy_timeout(options.max_backoff)?;
        apply_key(&conn, options.key.as_deref())?;
        // First real read; a wrong key fails here rather than at open
        first_read(&conn, options.key.is_some())?;

        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(mode = %mode, "store did not switch to WAL");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::migrate(&mut conn)?;
        // From here the retry loop owns contention; SQLite reports busy immediately
        conn.busy_timeout(Duration::ZERO)?;
        tracing::debug!(path = %path.display(), "store opened");

        Ok(Self {
            path,
            options,
            writer: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Independent read-only connection. Readers never wait on the writer.
    pub fn reader(&self) -> Result<Reader> {
        Reader::open(&self.path, self.options.key.as_deref())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic inside a write closure drops its transaction, so the
        // connection behind a poisoned lock is still consistent
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction, retrying on busy
    pub fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnMut(&Transaction<'_>) -> Result<T>,
    {
        self.write_until(None, f)
    }

    /// Like [`Store::write`], but abandons the write instead of sleeping
    /// past `deadline`
    pub fn write_until<T, F>(&self, deadline: Option<Instant>, mut f: F) -> Result<T>
    where
        F: FnMut(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock();
        let mut backoff = self.options.busy_backoff;
        let mut attempt: u32 = 0;

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(StorageError::DeadlineExceeded);
            }
            attempt += 1;

            match run_transaction(&mut conn, &mut f) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_busy() => {
                    if attempt >= self.options.busy_retries {
                        tracing::warn!(attempts = attempt, "store busy, giving up");
                        return Err(StorageError::Busy { attempts: attempt });
                    }
                    if deadline.is_some_and(|d| Instant::now() + backoff >= d) {
                        return Err(StorageError::DeadlineExceeded);
                    }
                    tracing::debug!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "store busy, retrying"
                    );
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(self.options.max_backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Raw writer access for maintenance; holds the writer lock
    pub(crate) fn with_writer<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock();
        f(&mut conn)
    }

    pub fn ensure_session(&self, session_id: &str, project: Option<&str>) -> Result<bool> {
        let now = Utc::now();
        self.write(|tx| writes::ensure_session(tx, session_id, project, &now))
    }

    pub fn start_session(&self, session_id: &str, project: Option<&str>) -> Result<bool> {
        let now = Utc::now();
        self.write(|tx| writes::start_session(tx, session_id, project, &now))
    }

    pub fn record_summary_failure(&self, session_id: &str, at: DateTime<Utc>) -> Result<u32> {
        self.write(|tx| writes::record_summary_failure(tx, session_id, &at))
    }

    pub fn end_session(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.write(|tx| writes::end_session(tx, session_id, &at))
    }

    pub fn record_prompt(&self, session_id: &str, source: PromptSource, text: &str) -> Result<Prompt> {
        let now = Utc::now();
        self.write(|tx| {
            writes::ensure_session(tx, session_id, None, &now)?;
            writes::record_prompt(tx, session_id, source, text, &now)
        })
    }

    pub fn record_observation(&self, new: &NewObservation) -> Result<Observation> {
        let now = Utc::now();
        self.write(|tx| {
            writes::ensure_session(tx, &new.session_id, None, &now)?;
            writes::record_observation(tx, new, &now)
        })
    }

    pub fn update_observation(
        &self,
        id: i64,
        content: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<()> {
        self.write(|tx| writes::update_observation(tx, id, content, metadata))
    }

    pub fn delete_observation(&self, id: i64) -> Result<()> {
        self.write(|tx| writes::delete_observation(tx, id))
    }

    pub fn upsert_summary(&self, summary: &Summary) -> Result<()> {
        self.write(|tx| writes::upsert_summary(tx, summary))
    }

    pub fn pin(&self, observation_id: i64, note: Option<&str>) -> Result<()> {
        let now = Utc::now();
        self.write(|tx| writes::pin(tx, observation_id, note, &now))
    }

    pub fn unpin(&self, observation_id: i64) -> Result<bool> {
        self.write(|tx| writes::unpin(tx, observation_id))
    }
}

fn run_transaction<T, F>(conn: &mut Connection, f: &mut F) -> Result<T>
where
    F: FnMut(&Transaction<'_>) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

pub(crate) fn apply_key(conn: &Connection, key: Option<&str>) -> Result<()> {
    if let Some(key) = key {
        if !cfg!(feature = "encryption") {
            tracing::warn!("encryption key set but store built without encryption; key ignored");
            return Ok(());
        }
        conn.pragma_update(None, "key", key)?;
    }
    Ok(())
}

/// Touch the schema so a bad key surfaces as [`StorageError::WrongKey`]
pub(crate) fn first_read(conn: &Connection, keyed: bool) -> Result<usize> {
    let result = conn
        .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(StorageError::from)
        .and_then(|_| migrations::schema_version(conn));
    match result {
        Err(e) if keyed && e.is_not_a_database() => Err(StorageError::WrongKey),
        other => other,
    }
}

/// Migrations that opening the store at `path` would apply. Reads only.
pub fn pending_migrations(path: &Path, key: Option<&str>) -> Result<usize> {
    if !path.exists() {
        return Ok(migrations::latest_version());
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    apply_key(&conn, key)?;
    let version = first_read(&conn, key.is_some())?;
    Ok(migrations::latest_version().saturating_sub(version))
}
