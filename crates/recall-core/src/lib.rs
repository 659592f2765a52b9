//! Domain types and configuration shared by every recall crate

mod config;
mod types;

pub use config::{
    CaptureConfig, Config, RetentionConfig, RetrievalConfig, StoreConfig, SummarizeConfig,
    SummarizerBackend,
};
pub use types::{
    db_time, normalize_path, NewObservation, Observation, ObservationKind, Prompt, PromptSource,
    Session, Summary, DEFAULT_SESSION_ID,
};
