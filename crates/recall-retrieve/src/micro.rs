//! Micro layer: where attention is in the current session

use crate::context::SessionContext;
use recall_core::{normalize_path, Observation, ObservationKind};
use std::collections::HashSet;

/// Cap on the hot set; beyond this the overlap signal is noise
const MAX_HOT_FILES: usize = 40;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "what", "when", "where", "how",
    "why", "was", "were", "are", "not", "but", "all", "any", "can", "use", "using",
];

/// Live signals derived from the current session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MicroView {
    /// Files in play, most recent first
    pub hot_files: Vec<String>,
    pub reads: usize,
    pub writes: usize,
    pub failures: usize,
    pub events: usize,
    /// Lowercased query terms
    pub terms: Vec<String>,
}

impl MicroView {
    /// `observations` must be in causal order, oldest first
    pub fn build(ctx: &SessionContext, observations: &[Observation]) -> Self {
        let mut view = MicroView::default();
        let mut seen = HashSet::new();

        for file in &ctx.working_files {
            let file = normalize_path(file, ctx.project.as_deref());
            if seen.insert(file.clone()) {
                view.hot_files.push(file);
            }
        }
        for obs in observations.iter().rev() {
            if let Some(file) = obs.file_path() {
                if seen.insert(file.to_string()) {
                    view.hot_files.push(file.to_string());
                }
            }
        }
        view.hot_files.truncate(MAX_HOT_FILES);

        let kinds = observations
            .iter()
            .map(|o| o.kind)
            .chain(ctx.recent_kinds.iter().copied());
        for kind in kinds {
            view.events += 1;
            match kind {
                ObservationKind::FileRead | ObservationKind::Search => view.reads += 1,
                ObservationKind::FileWrite | ObservationKind::FileEdit => view.writes += 1,
                ObservationKind::Failure => view.failures += 1,
                ObservationKind::Command | ObservationKind::Decision => {}
            }
        }

        if let Some(query) = &ctx.query {
            view.terms = terms(query);
        }
        view
    }

    /// Is there anything beyond time to rank by?
    pub fn has_signal(&self) -> bool {
        !self.hot_files.is_empty() || !self.terms.is_empty() || self.failures > 0
    }

    pub fn read_write_ratio(&self) -> Option<f64> {
        (self.writes > 0).then(|| self.reads as f64 / self.writes as f64)
    }

    /// Share of recent events that were failures
    pub fn failure_focus(&self) -> f64 {
        if self.events == 0 {
            0.0
        } else {
            self.failures as f64 / self.events as f64
        }
    }
}

/// Distinct lowercase words worth matching on
pub fn terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}
