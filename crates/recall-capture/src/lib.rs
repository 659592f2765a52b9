//! Capture pipeline: one lifecycle event in, at most one stored record out

pub mod event;
mod extract;
mod pipeline;

pub use event::{parse_event, parse_value, EventEnvelope, HookEvent, ParseError};
pub use extract::{extract, truncate_chars, Action, Skip};
pub use pipeline::{CaptureOutcome, CapturePipeline, DropReason};
