use recall_store::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error("summarizer timed out after {millis} ms")]
    Timeout { millis: u128 },

    #[error("summarizer failed: {0}")]
    Collaborator(String),

    #[error("summarizer returned an unusable draft: {0}")]
    InvalidResponse(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("session {0} is still open")]
    SessionOpen(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SummarizeError {
    /// Failures of the external collaborator rather than of local state
    pub fn is_collaborator(&self) -> bool {
        matches!(
            self,
            SummarizeError::Timeout { .. }
                | SummarizeError::Collaborator(_)
                | SummarizeError::InvalidResponse(_)
                | SummarizeError::Http(_)
        )
    }
}
