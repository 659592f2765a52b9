//! Path resolution for the store, config and side-channel files

use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable overriding the store location
pub const DB_ENV: &str = "RECALL_DB";
/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "RECALL_CONFIG";

/// Resolves standard paths under `~/.claude`
#[derive(Debug, Clone)]
pub struct Paths {
    pub home_claude: PathBuf,
}

impl Paths {
    /// Create a resolver rooted at the user's home directory
    pub fn new() -> std::io::Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "home directory not found")
        })?;

        Ok(Self::with_home(home.join(".claude")))
    }

    /// Create a resolver rooted at an explicit `.claude` directory
    pub fn with_home(home_claude: impl Into<PathBuf>) -> Self {
        Self {
            home_claude: home_claude.into(),
        }
    }

    /// Directory holding the store and its side-channel files
    pub fn data_dir(&self) -> PathBuf {
        self.home_claude.join("recall")
    }

    /// Store file (sidecars `-wal`/`-shm` live next to it)
    pub fn db_path(&self) -> PathBuf {
        env_path(DB_ENV).unwrap_or_else(|| self.data_dir().join("recall.db"))
    }

    /// User configuration file
    pub fn config_path(&self) -> PathBuf {
        env_path(CONFIG_ENV).unwrap_or_else(|| self.home_claude.join("recall.json"))
    }

    /// Side-channel diagnostics log
    pub fn diagnostics_file(&self) -> PathBuf {
        self.data_dir().join("diagnostics.jsonl")
    }

    /// Advisory marker for the background summarization worker
    pub fn worker_marker(&self) -> PathBuf {
        self.data_dir().join("worker.json")
    }

    /// Host settings file where hooks are registered
    pub fn settings_path(&self) -> PathBuf {
        self.home_claude.join("settings.json")
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Files with uncommitted changes in the git work tree containing `cwd`,
/// as absolute paths. Empty outside a repository.
pub fn changed_files(cwd: &Path) -> Vec<PathBuf> {
    let Some(root) = git_output(cwd, &["rev-parse", "--show-toplevel"]) else {
        return Vec::new();
    };
    let root = PathBuf::from(root.trim());

    let Some(status) = git_output(cwd, &["status", "--porcelain"]) else {
        return Vec::new();
    };

    status
        .lines()
        .filter_map(|line| {
            // "XY path" or "XY old -> new"
            let path = line.get(3..)?;
            let path = path.rsplit(" -> ").next()?.trim().trim_matches('"');
            if path.is_empty() {
                None
            } else {
                Some(root.join(path))
            }
        })
        .collect()
}

fn git_output(cwd: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        None
    }
}
