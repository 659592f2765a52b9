use super::{Env, Exit};
use crate::worker::{WorkerGuard, WorkerHandle};
use recall_store::StorageError;
use recall_summarize::{from_config, PendingReport, SessionSummarizer, SummarizeError, SummaryOutcome};

/// Upper bound on batches per worker run
const MAX_ROUNDS: usize = 20;

pub fn run(session: Option<&str>, pending: bool, worker: bool) -> anyhow::Result<Exit> {
    let env = Env::load()?;
    let summarizer = match from_config(&env.config.summarize) {
        Ok(Some(summarizer)) => summarizer,
        Ok(None) => {
            eprintln!("recall: summarization is disabled (summarize.backend = \"none\")");
            return Ok(Exit::Refused);
        }
        Err(e) => {
            eprintln!("recall: {e}");
            return Ok(Exit::Refused);
        }
    };

    let mut guard = if worker {
        match WorkerHandle::new(env.paths.worker_marker()).acquire()? {
            Some(guard) => Some(guard),
            None => {
                tracing::debug!("another worker holds the marker");
                return Ok(Exit::Ok);
            }
        }
    } else {
        None
    };

    let store = env.open_store()?;
    let log = env.diagnostics();
    let job = SessionSummarizer::new(&store, summarizer.as_ref(), &env.config.summarize)
        .with_diagnostics(&log);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match session {
        Some(id) => Ok(runtime.block_on(summarize_one(&job, id))),
        None if pending => {
            let report = runtime.block_on(drain_pending(&job, guard.as_mut()))?;
            print_report(&report);
            Ok(if report.is_clean() {
                Exit::Ok
            } else {
                Exit::Problem
            })
        }
        None => Ok(Exit::Refused),
    }
}

async fn summarize_one(job: &SessionSummarizer<'_>, session_id: &str) -> Exit {
    match job.summarize_session(session_id).await {
        Ok(SummaryOutcome::Stored(summary)) => {
            println!("{session_id}: {}", summary.intent);
            Exit::Ok
        }
        Ok(SummaryOutcome::Empty) => {
            println!("{session_id}: no events to summarize");
            Exit::Ok
        }
        Err(e @ SummarizeError::SessionOpen(_))
        | Err(e @ SummarizeError::Storage(StorageError::NotFound(_))) => {
            eprintln!("recall: {e}");
            Exit::Refused
        }
        Err(e) => {
            eprintln!("recall: {e}");
            Exit::Problem
        }
    }
}

/// Summarize pending sessions batch by batch until the queue is empty. Failed
/// sessions back off, so a batch of failures still lets the next batch reach
/// newer sessions.
pub async fn drain_pending(
    job: &SessionSummarizer<'_>,
    mut guard: Option<&mut WorkerGuard>,
) -> Result<PendingReport, SummarizeError> {
    let mut total = PendingReport::default();
    for _ in 0..MAX_ROUNDS {
        if let Some(guard) = guard.as_deref_mut() {
            if let Err(e) = guard.heartbeat() {
                tracing::warn!(error = %e, "worker heartbeat failed");
            }
        }
        let report = job.summarize_pending().await?;
        let attempted =
            !(report.summarized.is_empty() && report.empty.is_empty() && report.failed.is_empty());
        total.summarized.extend(report.summarized);
        total.empty.extend(report.empty);
        total.failed.extend(report.failed);
        if !attempted {
            break;
        }
    }
    total.failed.sort();
    total.failed.dedup();
    Ok(total)
}

fn print_report(report: &PendingReport) {
    for id in &report.summarized {
        println!("summarized {id}");
    }
    for id in &report.empty {
        println!("skipped {id} (no events)");
    }
    for (id, error) in &report.failed {
        eprintln!("failed {id}: {error}");
    }
    if report.summarized.is_empty() && report.empty.is_empty() && report.failed.is_empty() {
        println!("nothing pending");
    }
}
