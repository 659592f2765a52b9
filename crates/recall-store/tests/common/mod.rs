#![allow(dead_code)]

use chrono::{DateTime, Utc};
use recall_core::{NewObservation, ObservationKind, Summary};
use recall_store::{Store, StoreOptions};
use std::time::Duration;
use tempfile::TempDir;

pub fn open_store(dir: &TempDir) -> Store {
    Store::open(dir.path().join("recall.db"), StoreOptions::new()).unwrap()
}

/// Options that give up quickly so contention tests stay fast
pub fn impatient_options(retries: u32) -> StoreOptions {
    StoreOptions {
        busy_retries: retries,
        busy_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        ..StoreOptions::new()
    }
}

pub fn command(session: &str, text: &str) -> NewObservation {
    NewObservation {
        session_id: session.to_string(),
        kind: ObservationKind::Command,
        content: text.to_string(),
        metadata: serde_json::json!({ "command": text }),
    }
}

pub fn summary(session: &str, intent: &str, files: &[&str], at: DateTime<Utc>) -> Summary {
    Summary {
        session_id: session.to_string(),
        intent: intent.to_string(),
        learned: vec![],
        completed: vec![],
        next_steps: vec![],
        notable_failures: vec![],
        files: files.iter().map(|f| f.to_string()).collect(),
        created_at: at,
    }
}
