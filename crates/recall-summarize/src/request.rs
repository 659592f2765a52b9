//! The message boundary with the narrative collaborator: one request record
//! out, one draft record back

use crate::error::SummarizeError;
use recall_core::{Observation, Prompt, Summary};
use recall_redact::redactor;
use serde::{Deserialize, Serialize};

pub const INSTRUCTION: &str = "You are summarizing one finished coding session from its ordered \
event log. Describe what the session set out to do and how events led to one another, not just \
a list. Return only JSON with these keys: \
{\"intent\": \"<one sentence>\", \"learned\": [\"...\"], \"completed\": [\"...\"], \
\"next_steps\": [\"...\"], \"notable_failures\": [\"...\"]}. \
Use empty lists where nothing applies.";

/// What the collaborator receives
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRequest {
    pub session_id: String,
    pub project: Option<String>,
    pub instruction: String,
    /// Prompts and observations in causal order, one per line
    pub transcript: String,
    /// Distinct files the session touched
    pub files: Vec<String>,
}

/// What the collaborator returns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryDraft {
    pub intent: String,
    #[serde(default)]
    pub learned: Vec<String>,
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub notable_failures: Vec<String>,
}

impl SummaryDraft {
    /// Redact every field and attach the session's files
    pub fn into_summary(self, session_id: &str, files: Vec<String>) -> Summary {
        let clean = |s: String| redactor().redact_string(s).0;
        let list = |v: Vec<String>| {
            v.into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(clean)
                .collect()
        };
        Summary {
            session_id: session_id.to_string(),
            intent: clean(self.intent.trim().to_string()),
            learned: list(self.learned),
            completed: list(self.completed),
            next_steps: list(self.next_steps),
            notable_failures: list(self.notable_failures),
            files,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Pull the draft out of a model reply. Tolerates code fences and prose
/// around the JSON object.
pub fn parse_draft(text: &str) -> Result<SummaryDraft, SummarizeError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => {
            return Err(SummarizeError::InvalidResponse(
                "no JSON object in reply".to_string(),
            ))
        }
    };
    let draft: SummaryDraft = serde_json::from_str(json)
        .map_err(|e| SummarizeError::InvalidResponse(e.to_string()))?;
    if draft.intent.trim().is_empty() {
        return Err(SummarizeError::InvalidResponse("empty intent".to_string()));
    }
    Ok(draft)
}

enum Entry<'a> {
    Prompt(&'a Prompt),
    Observation(&'a Observation),
}

/// Interleave prompts and observations by time. A prompt sorts before
/// observations stamped at the same instant since it caused them.
pub fn transcript(prompts: &[Prompt], observations: &[Observation], max_chars: usize) -> String {
    let mut entries = Vec::with_capacity(prompts.len() + observations.len());
    let (mut p, mut o) = (0, 0);
    while p < prompts.len() || o < observations.len() {
        let take_prompt = match (prompts.get(p), observations.get(o)) {
            (Some(prompt), Some(obs)) => prompt.created_at <= obs.created_at,
            (Some(_), None) => true,
            _ => false,
        };
        if take_prompt {
            entries.push(Entry::Prompt(&prompts[p]));
            p += 1;
        } else {
            entries.push(Entry::Observation(&observations[o]));
            o += 1;
        }
    }

    let mut out = String::new();
    let total = entries.len();
    for (i, entry) in entries.into_iter().enumerate() {
        let line = match entry {
            Entry::Prompt(prompt) => format!(
                "[{} prompt #{}] {}",
                prompt.source.as_str(),
                prompt.ordinal,
                prompt.text
            ),
            Entry::Observation(obs) => format!("[{}] {}", obs.kind.as_str(), obs.content),
        };
        if out.len() + line.len() + 1 > max_chars {
            // The marker counts against the budget too; give back whole lines for it
            let mut remaining = total - i;
            let mut marker = truncation_marker(remaining);
            while !out.is_empty() && out.len() + marker.len() > max_chars {
                let keep = out[..out.len() - 1].rfind('\n').map_or(0, |at| at + 1);
                out.truncate(keep);
                remaining += 1;
                marker = truncation_marker(remaining);
            }
            if out.len() + marker.len() <= max_chars {
                out.push_str(&marker);
            }
            break;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn truncation_marker(remaining: usize) -> String {
    format!("[... {remaining} more events truncated]")
}

/// Every file occurrence, in order. Repeats count as extra touches.
pub fn touched_files(observations: &[Observation]) -> Vec<String> {
    observations
        .iter()
        .filter_map(|o| o.file_path().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use recall_core::{ObservationKind, PromptSource};
    use serde_json::json;

    #[test]
    fn test_parse_draft_tolerates_fences() {
        let reply = "Here you go:\n```json\n{\"intent\": \"speed up search\", \"learned\": [\"bm25 is negative\"]}\n```";
        let draft = parse_draft(reply).unwrap();
        assert_eq!(draft.intent, "speed up search");
        assert_eq!(draft.learned, ["bm25 is negative"]);
        assert!(draft.next_steps.is_empty());
    }

    #[test]
    fn test_parse_draft_rejects_unusable_replies() {
        for reply in ["no json here", "{\"learned\": []}", "{\"intent\": \"  \"}", "} {"] {
            assert!(matches!(
                parse_draft(reply),
                Err(SummarizeError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn test_into_summary_redacts_and_drops_blanks() {
        let draft = SummaryDraft {
            intent: "rotate key sk-ant-REDACTED".to_string(),
            learned: vec!["  ".to_string(), "token lives in .env".to_string()],
            ..SummaryDraft::default()
        };
        let summary = draft.into_summary("s1", vec!["/r/.env".to_string()]);
        assert_eq!(summary.intent, "rotate key [REDACTED]");
        assert_eq!(summary.learned, ["token lives in .env"]);
        assert_eq!(summary.files, ["/r/.env"]);
    }

    fn prompt(id: i64, ordinal: i64, at: DateTime<Utc>) -> Prompt {
        Prompt {
            id,
            session_id: "s".to_string(),
            source: PromptSource::User,
            ordinal,
            text: format!("step {ordinal}"),
            created_at: at,
        }
    }

    fn obs(id: i64, content: &str, at: DateTime<Utc>) -> Observation {
        Observation {
            id,
            session_id: "s".to_string(),
            prompt_id: None,
            kind: ObservationKind::Command,
            content: content.to_string(),
            metadata: json!({}),
            created_at: at,
        }
    }

    #[test]
    fn test_transcript_interleaves_in_causal_order() {
        let t0 = Utc::now();
        let prompts = vec![prompt(1, 1, t0), prompt(2, 2, t0 + Duration::seconds(10))];
        let observations = vec![
            obs(1, "ls", t0),
            obs(2, "cargo build", t0 + Duration::seconds(5)),
            obs(3, "cargo test", t0 + Duration::seconds(10)),
        ];

        let text = transcript(&prompts, &observations, 10_000);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "[user prompt #1] step 1",
                "[command] ls",
                "[command] cargo build",
                "[user prompt #2] step 2",
                "[command] cargo test",
            ]
        );

        let short = transcript(&prompts, &observations, 40);
        assert!(short.len() <= 40);
        assert!(short.ends_with("truncated]"));
    }

    #[test]
    fn test_truncated_transcript_stays_within_budget() {
        let t0 = Utc::now();
        let prompts = vec![prompt(1, 1, t0)];
        let observations = vec![
            obs(1, "ls", t0 + Duration::seconds(1)),
            obs(2, "cargo build", t0 + Duration::seconds(2)),
            obs(3, "cargo test", t0 + Duration::seconds(3)),
            obs(4, "cargo fmt", t0 + Duration::seconds(4)),
        ];

        for budget in [10, 30, 45, 60, 75] {
            let text = transcript(&prompts, &observations, budget);
            assert!(text.len() <= budget, "{budget}: {text:?}");
        }
        assert_eq!(
            transcript(&prompts, &observations, 60),
            "[user prompt #1] step 1\n[... 4 more events truncated]"
        );
    }
}
