use super::{Env, Exit};
use crate::worker::WorkerHandle;
use chrono::{Duration, Utc};
use recall_core::Summary;
use recall_store::{pending_migrations, StoreStatus};
use recall_telemetry::Diagnostic;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Diagnostics scanned for the report
const DIAGNOSTIC_TAIL: usize = 500;
const RECENT_SUMMARIES: usize = 3;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub store: PathBuf,
    pub initialized: bool,
    pub pending_migrations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<StoreStatus>,
    pub diagnostics: DiagnosticSummary,
    pub worker_running: bool,
    #[serde(skip)]
    pub recent_summaries: Vec<Summary>,
}

#[derive(Debug, Default, Serialize)]
pub struct DiagnosticSummary {
    pub last_24h: usize,
    /// `component/event` -> count over the last 24 hours
    pub by_event: BTreeMap<String, usize>,
    pub latest: Option<Diagnostic>,
}

impl DiagnosticSummary {
    fn from_tail(tail: Vec<Diagnostic>) -> Self {
        let cutoff = Utc::now() - Duration::hours(24);
        let mut summary = Self::default();
        for d in tail.iter().filter(|d| d.timestamp >= cutoff) {
            summary.last_24h += 1;
            *summary
                .by_event
                .entry(format!("{}/{}", d.component, d.event))
                .or_default() += 1;
        }
        summary.latest = tail.into_iter().last();
        summary
    }
}

impl StatusReport {
    pub fn exit(&self) -> Exit {
        match &self.health {
            Some(health) if self.initialized && health.is_healthy() => Exit::Ok,
            _ => Exit::Problem,
        }
    }
}

/// Inspect the store without migrating it
pub fn collect(env: &Env) -> anyhow::Result<StatusReport> {
    let path = env.store_path();
    let diagnostics = DiagnosticSummary::from_tail(env.diagnostics().recent(DIAGNOSTIC_TAIL));
    let worker_running = WorkerHandle::new(env.paths.worker_marker()).is_running();

    let mut report = StatusReport {
        store: path.clone(),
        initialized: path.exists(),
        pending_migrations: 0,
        health: None,
        diagnostics,
        worker_running,
        recent_summaries: Vec::new(),
    };
    if !report.initialized {
        return Ok(report);
    }

    let options = env.store_options();
    report.pending_migrations = pending_migrations(&path, options.key.as_deref())?;
    if report.pending_migrations > 0 {
        return Ok(report);
    }

    let store = env.open_store()?;
    report.health = Some(store.status()?);
    report.recent_summaries = store.reader()?.recent_summaries(RECENT_SUMMARIES)?;
    Ok(report)
}

pub fn run(json: bool) -> anyhow::Result<Exit> {
    let env = Env::load()?;
    let report = collect(&env)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human(&report);
    }
    Ok(report.exit())
}

fn print_human(report: &StatusReport) {
    println!("Store: {}", report.store.display());
    if !report.initialized {
        println!("  not initialized (run `recall init`)");
        return;
    }
    if report.pending_migrations > 0 {
        println!(
            "  {} pending migration(s); run `recall maintain` to apply",
            report.pending_migrations
        );
    }

    if let Some(health) = &report.health {
        let verdict = if health.is_healthy() { "healthy" } else { "UNHEALTHY" };
        println!(
            "  schema v{}/{} ({verdict})",
            health.schema_version, health.latest_version
        );
        println!(
            "  {} sessions, {} prompts, {} observations, {} summaries, {} pins",
            health.counts.sessions,
            health.counts.prompts,
            health.counts.observations,
            health.counts.summaries,
            health.counts.pins
        );
        println!(
            "  {:.1} KiB on disk (+{:.1} KiB WAL)",
            health.db_bytes as f64 / 1024.0,
            health.wal_bytes as f64 / 1024.0
        );
        for problem in health.quick_check.iter().chain(&health.fts_errors) {
            println!("  ! {problem}");
        }
    }

    println!(
        "Worker: {}",
        if report.worker_running { "running" } else { "idle" }
    );

    if !report.recent_summaries.is_empty() {
        println!("\nRecent summaries:");
        for summary in &report.recent_summaries {
            println!(
                "  {} {}: {}",
                summary.created_at.format("%Y-%m-%d"),
                summary.session_id,
                summary.intent
            );
        }
    }

    let diag = &report.diagnostics;
    println!("\nDiagnostics (24h): {}", diag.last_24h);
    for (event, count) in &diag.by_event {
        println!("  {event}: {count}");
    }
    if let Some(latest) = &diag.latest {
        println!(
            "  latest: {} {}/{}: {}",
            latest.timestamp.to_rfc3339(),
            latest.component,
            latest.event,
            latest.message
        );
    }
}
