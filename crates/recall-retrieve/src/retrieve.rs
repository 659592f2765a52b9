//! The micro/macro join. Never fails: every layer degrades on its own.

use crate::context::SessionContext;
use crate::micro::MicroView;
use crate::rank::{self, ContextItem};
use crate::render::{fit_budget, render};
use chrono::{DateTime, Duration, Utc};
use recall_core::{ObservationKind, RetrievalConfig};
use recall_store::Reader;
use std::collections::HashSet;

/// Kinds worth resurfacing when they touched a hot file
const FILE_MATCH_KINDS: [ObservationKind; 3] = [
    ObservationKind::Failure,
    ObservationKind::Decision,
    ObservationKind::FileEdit,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    /// Ranked and budgeted, best first
    pub items: Vec<ContextItem>,
    pub micro: MicroView,
    /// Ranked by recency alone because the micro layer was empty
    pub fallback: bool,
    /// Layers that failed and were skipped
    pub degraded: Vec<String>,
    /// Markdown block for the host; empty when there are no items
    pub rendered: String,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn unavailable(reason: String) -> Self {
        Self {
            degraded: vec![reason],
            ..Self::default()
        }
    }
}

pub struct Retriever<'a> {
    config: &'a RetrievalConfig,
    now: DateTime<Utc>,
}

impl<'a> Retriever<'a> {
    pub fn new(config: &'a RetrievalConfig) -> Self {
        Self {
            config,
            now: Utc::now(),
        }
    }

    /// Pin the clock, for reproducible scoring
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Retrieve from a store that may not be reachable
    pub fn retrieve_or_empty<E: std::fmt::Display>(
        &self,
        reader: Result<Reader, E>,
        ctx: &SessionContext,
    ) -> Retrieval {
        match reader {
            Ok(reader) => self.retrieve(&reader, ctx),
            Err(err) => {
                tracing::debug!(error = %err, "store unavailable, no context");
                Retrieval::unavailable(format!("store: {err}"))
            }
        }
    }

    pub fn retrieve(&self, reader: &Reader, ctx: &SessionContext) -> Retrieval {
        let mut degraded = Vec::new();
        let config = self.config;

        // Micro: the current session's recent observations
        let observations = match &ctx.session_id {
            Some(session_id) => {
                let since = micro_since(self.now, config.micro_window_minutes, ctx.elapsed);
                reader
                    .observations_since(session_id, &since)
                    .unwrap_or_else(|e| {
                        degraded.push(format!("micro: {e}"));
                        Vec::new()
                    })
            }
            None => Vec::new(),
        };
        let micro = MicroView::build(ctx, &observations);
        let exclude = ctx.session_id.as_deref();

        // Macro: past summaries joined on the hot set
        let candidates = reader
            .summary_candidates(
                &micro.hot_files,
                ctx.project.as_deref(),
                exclude,
                config.candidate_limit,
            )
            .unwrap_or_else(|e| {
                degraded.push(format!("macro: {e}"));
                Vec::new()
            });
        let fallback = !micro.has_signal();
        let mut items = if fallback {
            rank::rank_by_recency(
                candidates.into_iter().map(|c| c.summary).collect(),
                config,
                &self.now,
            )
        } else {
            candidates
                .into_iter()
                .map(|c| {
                    let score =
                        rank::score_summary(&c.summary, c.overlap, &micro, config, &self.now);
                    ContextItem::Summary {
                        summary: c.summary,
                        overlap: c.overlap,
                        score,
                    }
                })
                .collect()
        };

        let pinned = reader.pinned(config.max_items).unwrap_or_else(|e| {
            degraded.push(format!("pins: {e}"));
            Vec::new()
        });
        let mut seen: HashSet<i64> = HashSet::new();
        for pin in pinned {
            seen.insert(pin.observation.id);
            items.push(ContextItem::Pinned {
                observation: pin.observation,
                note: pin.note,
                score: config.pinned_score,
            });
        }

        let matches = reader
            .file_matches(
                &micro.hot_files,
                &FILE_MATCH_KINDS,
                exclude,
                config.file_match_limit,
            )
            .unwrap_or_else(|e| {
                degraded.push(format!("file matches: {e}"));
                Vec::new()
            });
        for observation in matches {
            if !seen.insert(observation.id) {
                continue;
            }
            let score = rank::score_file_match(&observation, &micro, config, &self.now);
            items.push(ContextItem::FileMatch { observation, score });
        }

        rank::sort_by_score(&mut items);
        let (kept, sections) = fit_budget(&items, config.max_items, config.max_chars);
        items.truncate(kept);

        for reason in &degraded {
            tracing::warn!(reason = %reason, "retrieval layer skipped");
        }
        tracing::debug!(
            items = items.len(),
            hot_files = micro.hot_files.len(),
            fallback,
            "retrieved"
        );

        Retrieval {
            rendered: render(&sections),
            items,
            micro,
            fallback,
            degraded,
        }
    }
}

/// Start of the micro window: the configured span, shortened to the session's
/// age. A span too large to represent leaves no lower bound.
fn micro_since(now: DateTime<Utc>, window_minutes: i64, elapsed: Option<Duration>) -> DateTime<Utc> {
    let window = match (Duration::try_minutes(window_minutes), elapsed) {
        (Some(window), Some(elapsed)) => Some(window.min(elapsed)),
        (window, elapsed) => window.or(elapsed),
    };
    window
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
