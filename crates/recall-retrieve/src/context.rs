//! What the caller knows about "right now"

use chrono::Duration;
use recall_core::ObservationKind;

/// Current session state handed to retrieval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub session_id: Option<String>,
    /// Working directory of the host; scopes the macro join
    pub project: Option<String>,
    /// Files the caller already knows are in play (e.g. uncommitted changes)
    pub working_files: Vec<String>,
    /// Event kinds seen recently that are not yet in the store
    pub recent_kinds: Vec<ObservationKind>,
    /// Time since the session started
    pub elapsed: Option<Duration>,
    /// Free text from an interactive query
    pub query: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.working_files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}
