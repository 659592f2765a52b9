//! Markdown rendering within a character budget

use crate::rank::ContextItem;
use std::fmt::Write;

const HEADER: &str = "# Recalled context\n";
const MAX_OBSERVATION_CHARS: usize = 400;

fn first_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

fn bullets(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{label}:");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// One item as a markdown section
pub fn render_item(item: &ContextItem) -> String {
    let mut out = String::new();
    match item {
        ContextItem::Summary {
            summary, overlap, ..
        } => {
            let _ = write!(
                out,
                "## Earlier session ({}): {}",
                summary.created_at.format("%Y-%m-%d"),
                summary.intent
            );
            if *overlap > 0 {
                let _ = write!(out, " [{overlap} shared files]");
            }
            out.push('\n');
            bullets(&mut out, "Learned", &summary.learned);
            bullets(&mut out, "Completed", &summary.completed);
            bullets(&mut out, "Next steps", &summary.next_steps);
            bullets(&mut out, "Failures", &summary.notable_failures);
            if !summary.files.is_empty() {
                let shown: Vec<&str> = summary.files.iter().take(8).map(String::as_str).collect();
                let _ = writeln!(out, "Files: {}", shown.join(", "));
            }
        }
        ContextItem::Pinned {
            observation, note, ..
        } => {
            let _ = writeln!(out, "## Pinned {}", observation.kind.as_str());
            if let Some(note) = note {
                let _ = writeln!(out, "Note: {note}");
            }
            let _ = writeln!(out, "{}", first_chars(&observation.content, MAX_OBSERVATION_CHARS));
        }
        ContextItem::FileMatch { observation, .. } => {
            let file = observation.file_path().unwrap_or("?");
            let _ = writeln!(
                out,
                "## Prior {} on {} ({})",
                observation.kind.as_str(),
                file,
                observation.created_at.format("%Y-%m-%d")
            );
            let _ = writeln!(out, "{}", first_chars(&observation.content, MAX_OBSERVATION_CHARS));
        }
    }
    out
}

/// Keep leading items while both budgets hold. Returns the kept prefix
/// length and the rendered sections.
pub fn fit_budget(items: &[ContextItem], max_items: usize, max_chars: usize) -> (usize, Vec<String>) {
    let mut sections = Vec::new();
    let mut used = HEADER.len();
    for item in items.iter().take(max_items) {
        let section = render_item(item);
        // +1 for the blank line between sections
        if used + section.len() + 1 > max_chars {
            break;
        }
        used += section.len() + 1;
        sections.push(section);
    }
    (sections.len(), sections)
}

/// Full block; empty when there is nothing to say
pub fn render(sections: &[String]) -> String {
    if sections.is_empty() {
        return String::new();
    }
    let mut out = String::from(HEADER);
    for section in sections {
        out.push('\n');
        out.push_str(section);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use recall_core::{Observation, ObservationKind, Summary};
    use serde_json::json;

    fn summary_item(intent: &str) -> ContextItem {
        ContextItem::Summary {
            summary: Summary {
                session_id: "s".to_string(),
                intent: intent.to_string(),
                learned: vec!["bm25 weights are negative".to_string()],
                completed: vec![],
                next_steps: vec!["wire the reader".to_string()],
                notable_failures: vec![],
                files: vec!["/r/reader.rs".to_string()],
                created_at: Utc::now(),
            },
            overlap: 1,
            score: 1.0,
        }
    }

    #[test]
    fn test_summary_section_lists_fields() {
        let text = render_item(&summary_item("add search"));
        assert!(text.starts_with("## Earlier session ("));
        assert!(text.contains("add search [1 shared files]"));
        assert!(text.contains("Learned:\n- bm25 weights are negative"));
        assert!(text.contains("Next steps:\n- wire the reader"));
        assert!(!text.contains("Completed:"));
        assert!(text.contains("Files: /r/reader.rs"));
    }

    #[test]
    fn test_file_match_section_is_bounded() {
        let item = ContextItem::FileMatch {
            observation: Observation {
                id: 1,
                session_id: "s".to_string(),
                prompt_id: None,
                kind: ObservationKind::Failure,
                content: "x".repeat(2000),
                metadata: json!({"file_path": "/r/a.rs"}),
                created_at: Utc::now(),
            },
            score: 0.5,
        };
        let text = render_item(&item);
        assert!(text.starts_with("## Prior failure on /r/a.rs"));
        assert!(text.len() < 600);
    }

    #[test]
    fn test_budget_respects_chars_and_items() {
        let items: Vec<ContextItem> = (0..5).map(|i| summary_item(&format!("task {i}"))).collect();
        let one = render_item(&items[0]).len();

        let (kept, sections) = fit_budget(&items, 3, 100_000);
        assert_eq!(kept, 3);
        assert_eq!(sections.len(), 3);

        let (kept, _) = fit_budget(&items, 10, HEADER.len() + 2 * (one + 1));
        assert_eq!(kept, 2);

        let (kept, sections) = fit_budget(&items, 10, 10);
        assert_eq!(kept, 0);
        assert_eq!(render(&sections), "");
    }

    #[test]
    fn test_render_stays_within_budget() {
        let items: Vec<ContextItem> = (0..20).map(|i| summary_item(&format!("task {i}"))).collect();
        let (_, sections) = fit_budget(&items, 20, 700);
        assert!(render(&sections).len() <= 700);
    }
}
