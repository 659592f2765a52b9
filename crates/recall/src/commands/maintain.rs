use super::{Env, Exit};
use chrono::{Duration, Utc};
use recall_store::{MaintenancePlan, MaintenanceReport};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Outcome {
    #[serde(flatten)]
    report: MaintenanceReport,
    diagnostics_dropped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics_error: Option<String>,
}

/// Plan derived from retention settings and command flags
pub fn plan(env: &Env, no_prune: bool, reredact: bool) -> MaintenancePlan {
    let prune_before = if no_prune {
        None
    } else {
        env.config
            .retention
            .observation_days
            .map(|days| Utc::now() - Duration::days(i64::from(days)))
    };
    MaintenancePlan {
        prune_before,
        reredact,
        ..MaintenancePlan::new()
    }
}

pub fn run(no_prune: bool, reredact: bool, json: bool) -> anyhow::Result<Exit> {
    let env = Env::load()?;
    // Opening applies pending migrations
    let store = env.open_store()?;
    let report = store.maintain(&plan(&env, no_prune, reredact))?;

    let (diagnostics_dropped, diagnostics_error) = match env
        .diagnostics()
        .truncate_to(env.config.retention.diagnostics_keep)
    {
        Ok(dropped) => (dropped, None),
        Err(e) => {
            tracing::warn!(error = %e, "could not trim diagnostics log");
            (0, Some(e.to_string()))
        }
    };

    let exit = if report.is_clean() && diagnostics_error.is_none() {
        Exit::Ok
    } else {
        Exit::Problem
    };
    let outcome = Outcome {
        report,
        diagnostics_dropped,
        diagnostics_error,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(exit);
    }

    let report = &outcome.report;
    println!("Pruned {} observation(s)", report.pruned);
    if reredact {
        println!("Re-redacted {} row(s)", report.reredacted);
    }
    if report.fts_optimized {
        println!("Optimized full-text indexes");
    }
    if report.checkpointed {
        println!("Checkpointed WAL");
    }
    if outcome.diagnostics_dropped > 0 {
        println!("Trimmed {} diagnostic record(s)", outcome.diagnostics_dropped);
    }
    for error in &report.integrity_errors {
        println!("! integrity: {error}");
    }
    if let Some(error) = &outcome.diagnostics_error {
        println!("! diagnostics: {error}");
    }
    Ok(exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::scratch_env;

    #[test]
    fn test_plan_follows_retention() {
        let (_temp, mut env) = scratch_env();
        let p = plan(&env, false, false);
        let cutoff = p.prune_before.unwrap();
        let expected = Utc::now() - Duration::days(90);
        assert!((cutoff - expected).num_seconds().abs() < 5);
        assert!(!p.reredact);

        assert!(plan(&env, true, true).prune_before.is_none());
        assert!(plan(&env, true, true).reredact);

        env.config.retention.observation_days = None;
        assert!(plan(&env, false, false).prune_before.is_none());
    }
}
