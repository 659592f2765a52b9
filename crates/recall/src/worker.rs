//! Background summarization worker, tracked by an advisory marker file
//!
//! The marker (`worker.json`) is created with `create_new`, so only one worker
//! holds it at a time. A marker whose heartbeat is older than `stale_after`
//! belongs to a worker that died and may be taken over.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const DEFAULT_STALE_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMarker {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub heartbeat: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WorkerHandle {
    marker: PathBuf,
    stale_after: Duration,
}

impl WorkerHandle {
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
            stale_after: Duration::minutes(DEFAULT_STALE_MINUTES),
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    pub fn read(&self) -> Option<WorkerMarker> {
        let content = std::fs::read_to_string(&self.marker).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Last sign of life: the heartbeat, or the file's mtime while a fresh
    /// marker is still being written
    fn last_seen(&self) -> Option<DateTime<Utc>> {
        if let Some(marker) = self.read() {
            return Some(marker.heartbeat);
        }
        let modified = std::fs::metadata(&self.marker).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    /// A worker holds the marker and has beaten recently
    pub fn is_running(&self) -> bool {
        self.last_seen()
            .is_some_and(|seen| Utc::now() - seen < self.stale_after)
    }

    /// Call `spawn` unless a healthy worker already exists. Returns whether a
    /// worker was started. Safe to call from every session end: a second
    /// worker racing the first fails to `acquire` and exits.
    pub fn ensure_started<F>(&self, spawn: F) -> io::Result<bool>
    where
        F: FnOnce() -> io::Result<()>,
    {
        if self.is_running() {
            tracing::debug!(marker = %self.marker.display(), "worker already running");
            return Ok(false);
        }
        spawn()?;
        tracing::debug!("worker started");
        Ok(true)
    }

    /// Claim the marker for this process. `None` when a healthy worker holds it.
    pub fn acquire(&self) -> io::Result<Option<WorkerGuard>> {
        if let Some(parent) = self.marker.parent() {
            std::fs::create_dir_all(parent)?;
        }

        for _ in 0..2 {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.marker)
            {
                Ok(mut file) => {
                    let now = Utc::now();
                    let marker = WorkerMarker {
                        pid: std::process::id(),
                        started_at: now,
                        heartbeat: now,
                    };
                    file.write_all(&serde_json::to_vec(&marker)?)?;
                    return Ok(Some(WorkerGuard {
                        path: self.marker.clone(),
                        marker,
                    }));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if self.is_running() {
                        return Ok(None);
                    }
                    tracing::info!(marker = %self.marker.display(), "taking over stale worker marker");
                    match std::fs::remove_file(&self.marker) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

/// Held by the running worker; removes the marker on drop
#[derive(Debug)]
pub struct WorkerGuard {
    path: PathBuf,
    marker: WorkerMarker,
}

impl WorkerGuard {
    pub fn heartbeat(&mut self) -> io::Result<()> {
        self.marker.heartbeat = Utc::now();
        let json = serde_json::to_vec(&self.marker)?;
        recall_telemetry::atomic_write(&self.path, &json)
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(error = %e, "worker marker already gone");
        }
    }
}

/// Launch a detached `recall summarize --pending --worker`
pub fn spawn_detached() -> io::Result<()> {
    let exe = std::env::current_exe()?;
    Command::new(exe)
        .args(["summarize", "--pending", "--worker"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}
