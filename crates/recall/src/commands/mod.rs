pub mod hooks;
pub mod init;
pub mod maintain;
pub mod pin;
pub mod query;
pub mod status;
pub mod summarize;
pub mod version;

use recall_core::Config;
use recall_store::{Reader, Store, StoreOptions};
use recall_telemetry::{DiagnosticLog, Paths};
use std::path::PathBuf;
use std::process::ExitCode;

/// Process exit signal for maintenance commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Ran fine
    Ok,
    /// Ran, but found or hit something recoverable
    Problem,
    /// Refused to run
    Refused,
}

impl Exit {
    pub fn code(self) -> u8 {
        match self {
            Exit::Ok => 0,
            Exit::Problem => 1,
            Exit::Refused => 2,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Resolved paths and configuration for one invocation
pub struct Env {
    pub paths: Paths,
    pub config: Config,
}

impl Env {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::with_paths(Paths::new()?))
    }

    pub fn with_paths(paths: Paths) -> Self {
        let config = Config::load(&paths.config_path());
        Self { paths, config }
    }

    pub fn store_path(&self) -> PathBuf {
        self.config.store_path(&self.paths)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::from_config(&self.config.store)
    }

    pub fn open_store(&self) -> recall_store::Result<Store> {
        Store::open(self.store_path(), self.store_options())
    }

    pub fn open_reader(&self) -> recall_store::Result<Reader> {
        Reader::open(&self.store_path(), self.store_options().key.as_deref())
    }

    pub fn diagnostics(&self) -> DiagnosticLog {
        DiagnosticLog::new(self.paths.diagnostics_file())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Env;
    use recall_telemetry::Paths;
    use tempfile::TempDir;

    /// An environment rooted in a scratch `.claude` directory
    pub fn scratch_env() -> (TempDir, Env) {
        let temp = TempDir::new().unwrap();
        let claude = temp.path().join(".claude");
        std::fs::create_dir_all(&claude).unwrap();
        let mut env = Env::with_paths(Paths::with_home(&claude));
        env.config.store.path = Some(claude.join("recall/recall.db"));
        env.config.capture.hook_budget_ms = 2000;
        (temp, env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_three_tier() {
        assert_eq!(Exit::Ok.code(), 0);
        assert_eq!(Exit::Problem.code(), 1);
        assert_eq!(Exit::Refused.code(), 2);
    }
}
