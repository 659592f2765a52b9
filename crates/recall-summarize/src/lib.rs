//! Summarization: compress a closed session into one durable summary

mod collaborator;
mod error;
mod orchestrate;
mod request;

pub use collaborator::{from_config, AnthropicSummarizer, CommandSummarizer, Summarizer};
pub use error::SummarizeError;
pub use orchestrate::{PendingReport, SessionSummarizer, SummaryOutcome};
pub use request::{parse_draft, transcript, SummaryDraft, SummaryRequest, INSTRUCTION};
