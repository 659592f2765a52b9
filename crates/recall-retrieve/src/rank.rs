//! Scoring: macro items weighted by how they intersect the micro view

use crate::micro::MicroView;
use chrono::{DateTime, Utc};
use recall_core::{Observation, ObservationKind, RetrievalConfig, Summary};
use std::cmp::Ordering;

/// One piece of prior context offered to the host
#[derive(Debug, Clone, PartialEq)]
pub enum ContextItem {
    Summary {
        summary: Summary,
        /// Hot files this summary's session also touched
        overlap: usize,
        score: f64,
    },
    Pinned {
        observation: Observation,
        note: Option<String>,
        score: f64,
    },
    FileMatch {
        observation: Observation,
        score: f64,
    },
}

impl ContextItem {
    pub fn score(&self) -> f64 {
        match self {
            ContextItem::Summary { score, .. }
            | ContextItem::Pinned { score, .. }
            | ContextItem::FileMatch { score, .. } => *score,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            ContextItem::Summary { summary, .. } => &summary.session_id,
            ContextItem::Pinned { observation, .. } | ContextItem::FileMatch { observation, .. } => {
                &observation.session_id
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ContextItem::Summary { .. } => "summary",
            ContextItem::Pinned { .. } => "pinned",
            ContextItem::FileMatch { .. } => "file_match",
        }
    }
}

/// `0.5^(age / half_life)`; 1.0 for anything from the future
pub fn recency(created_at: &DateTime<Utc>, now: &DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_days = (*now - *created_at).num_seconds().max(0) as f64 / 86_400.0;
    if half_life_days <= 0.0 {
        return 0.0;
    }
    0.5_f64.powf(age_days / half_life_days)
}

fn summary_text(summary: &Summary) -> String {
    let mut text = summary.intent.to_lowercase();
    for part in summary
        .learned
        .iter()
        .chain(&summary.completed)
        .chain(&summary.next_steps)
        .chain(&summary.notable_failures)
        .chain(&summary.files)
    {
        text.push(' ');
        text.push_str(&part.to_lowercase());
    }
    text
}

/// Fraction of query terms the summary mentions
pub fn topic_match(summary: &Summary, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let text = summary_text(summary);
    let hits = terms.iter().filter(|t| text.contains(t.as_str())).count();
    hits as f64 / terms.len() as f64
}

/// file·overlap + topic·match + failure·focus·has_failures + recency·decay
pub fn score_summary(
    summary: &Summary,
    overlap: usize,
    micro: &MicroView,
    config: &RetrievalConfig,
    now: &DateTime<Utc>,
) -> f64 {
    let file_overlap = if micro.hot_files.is_empty() {
        0.0
    } else {
        overlap as f64 / micro.hot_files.len() as f64
    };
    let has_failures = if summary.notable_failures.is_empty() { 0.0 } else { 1.0 };

    config.file_weight * file_overlap
        + config.topic_weight * topic_match(summary, &micro.terms)
        + config.failure_weight * micro.failure_focus() * has_failures
        + config.recency_weight * recency(&summary.created_at, now, config.half_life_days)
}

/// A prior observation on a hot file. Failures and decisions count for
/// more than plain edits.
pub fn score_file_match(
    observation: &Observation,
    micro: &MicroView,
    config: &RetrievalConfig,
    now: &DateTime<Utc>,
) -> f64 {
    let file_share = if micro.hot_files.is_empty() {
        0.0
    } else {
        1.0 / micro.hot_files.len() as f64
    };
    let kind_bonus = match observation.kind {
        ObservationKind::Failure => config.failure_weight * (1.0 + micro.failure_focus()),
        ObservationKind::Decision => config.failure_weight,
        _ => 0.0,
    };
    config.file_weight * 0.5 * file_share
        + kind_bonus
        + config.recency_weight * recency(&observation.created_at, now, config.half_life_days)
}

/// Fallback when there is no micro signal: newest first, scored by decay alone
pub fn rank_by_recency(
    summaries: Vec<Summary>,
    config: &RetrievalConfig,
    now: &DateTime<Utc>,
) -> Vec<ContextItem> {
    let mut items: Vec<ContextItem> = summaries
        .into_iter()
        .map(|summary| {
            let score =
                config.recency_weight * recency(&summary.created_at, now, config.half_life_days);
            ContextItem::Summary {
                summary,
                overlap: 0,
                score,
            }
        })
        .collect();
    sort_by_score(&mut items);
    items
}

/// Highest score first; pinned items win ties
pub fn sort_by_score(items: &mut [ContextItem]) {
    items.sort_by(|a, b| {
        let a_pinned = matches!(a, ContextItem::Pinned { .. });
        let b_pinned = matches!(b, ContextItem::Pinned { .. });
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(Ordering::Equal)
            .then(b_pinned.cmp(&a_pinned))
    });
}
