//! Layered configuration: defaults, then `recall.json`, then environment

use recall_telemetry::{Paths, DB_ENV};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Store location, encryption and write-contention policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store file; `RECALL_DB` wins over this
    pub path: Option<PathBuf>,
    /// Require an encryption key before touching the store
    pub encrypted: bool,
    /// Environment variable holding the key
    pub key_env: String,
    /// Attempts on a busy store before giving up
    pub busy_retries: u32,
    /// First backoff; doubles per attempt up to `max_backoff_ms`
    pub busy_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            path: None,
            encrypted: false,
            key_env: "RECALL_KEY".to_string(),
            busy_retries: 8,
            busy_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }

    /// Encryption key from the configured environment variable
    pub fn encryption_key(&self) -> Option<String> {
        std::env::var(&self.key_env).ok().filter(|k| !k.is_empty())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Hook-path capture limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Wall-clock budget for redact + persist; the write is abandoned after it
    pub hook_budget_ms: u64,
    /// Failure/outcome text kept per observation
    pub max_failure_chars: usize,
    /// Old/new excerpt kept per edit
    pub max_excerpt_chars: usize,
    pub max_prompt_chars: usize,
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self {
            hook_budget_ms: 800,
            max_failure_chars: 2000,
            max_excerpt_chars: 160,
            max_prompt_chars: 4000,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Ranking weights and output budgets for retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Max context items handed to the host
    pub max_items: usize,
    /// Max rendered characters handed to the host
    pub max_chars: usize,
    /// Micro layer looks at current-session events this recent
    pub micro_window_minutes: i64,
    /// Past summaries considered by the macro join
    pub candidate_limit: usize,
    /// Prior observations considered for file-overlap matches
    pub file_match_limit: usize,
    pub half_life_days: f64,
    pub file_weight: f64,
    pub topic_weight: f64,
    pub failure_weight: f64,
    pub recency_weight: f64,
    pub pinned_score: f64,
}

impl RetrievalConfig {
    pub fn new() -> Self {
        Self {
            max_items: 8,
            max_chars: 6000,
            micro_window_minutes: 30,
            candidate_limit: 50,
            file_match_limit: 10,
            half_life_days: 7.0,
            file_weight: 1.0,
            topic_weight: 0.5,
            failure_weight: 0.2,
            recency_weight: 0.15,
            pinned_score: 2.0,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Which narrative-generation collaborator to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizerBackend {
    None,
    Anthropic,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeConfig {
    pub backend: SummarizerBackend,
    pub model: String,
    pub api_key_env: String,
    pub endpoint: String,
    /// Program and arguments for the `command` backend
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub max_input_chars: usize,
    /// Sessions summarized per worker run
    pub batch_limit: usize,
}

impl SummarizeConfig {
    pub fn new() -> Self {
        Self {
            backend: SummarizerBackend::Anthropic,
            model: "claude-3-haiku-20240307".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            command: Vec::new(),
            timeout_secs: 60,
            max_input_chars: 20000,
            batch_limit: 5,
        }
    }
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Raw observations of summarized sessions older than this are pruned
    pub observation_days: Option<u32>,
    /// Diagnostics log records kept by `maintain`
    pub diagnostics_keep: usize,
}

impl RetentionConfig {
    pub fn new() -> Self {
        Self {
            observation_days: Some(90),
            diagnostics_keep: 2000,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub capture: CaptureConfig,
    pub retrieval: RetrievalConfig,
    pub summarize: SummarizeConfig,
    pub retention: RetentionConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing or malformed file yields defaults so the
    /// hook path never fails on configuration.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::new();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                return Self::new();
            }
        };

        match serde_json::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config malformed, using defaults");
                Self::new()
            }
        }
    }

    /// Store file: `RECALL_DB`, then `store.path`, then the default location
    pub fn store_path(&self, paths: &Paths) -> PathBuf {
        if std::env::var_os(DB_ENV).is_none() {
            if let Some(path) = &self.store.path {
                return path.clone();
            }
        }
        paths.db_path()
    }
}
