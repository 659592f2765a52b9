use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "recall")]
#[command(version)]
#[command(about = "Persistent memory for AI coding assistants")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Hook: record session start and inject recalled context (stdin/stdout JSON)
    #[command(name = "hook:session-start")]
    HookSessionStart,

    /// Hook: capture one lifecycle event from stdin
    #[command(name = "hook:capture")]
    HookCapture,

    /// Hook: close the session and wake the summarization worker
    #[command(name = "hook:session-end")]
    HookSessionEnd,

    /// Show store health, pending migrations and recent diagnostics
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Compact indexes, check integrity and prune old observations
    Maintain {
        /// Skip retention pruning
        #[arg(long)]
        no_prune: bool,

        /// Re-apply current redaction rules to stored text
        #[arg(long)]
        reredact: bool,

        #[arg(long)]
        json: bool,
    },

    /// Ad hoc retrieval against the store
    Query {
        text: String,

        /// Files to treat as the working set
        #[arg(long, num_args = 1..)]
        files: Vec<String>,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Summarize one closed session or every pending one
    Summarize {
        #[arg(long, conflicts_with = "pending", required_unless_present = "pending")]
        session: Option<String>,

        #[arg(long)]
        pending: bool,

        /// Run as the background worker (holds the worker marker)
        #[arg(long, hide = true, requires = "pending")]
        worker: bool,
    },

    /// Pin an observation so it is always recalled
    Pin {
        id: i64,

        #[arg(long)]
        note: Option<String>,
    },

    /// Remove a pin
    Unpin { id: i64 },

    /// Register recall hooks in the host settings
    Init,

    /// Print version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::try_parse_from(["recall", "version"]);
        assert!(cli.is_ok());
        assert!(matches!(cli.unwrap().command, Commands::Version));
    }

    #[test]
    fn test_cli_parse_hook_commands() {
        let hooks = ["hook:session-start", "hook:capture", "hook:session-end"];

        for hook in hooks {
            let cli = Cli::try_parse_from(["recall", hook]);
            assert!(cli.is_ok(), "Failed to parse {}", hook);
        }
    }

    #[test]
    fn test_cli_parse_query() {
        let cli = Cli::try_parse_from([
            "recall", "query", "token refresh", "--files", "a.rs", "b.rs", "--limit", "3",
        ])
        .unwrap();
        if let Commands::Query {
            text, files, limit, json,
        } = cli.command
        {
            assert_eq!(text, "token refresh");
            assert_eq!(files, ["a.rs", "b.rs"]);
            assert_eq!(limit, 3);
            assert!(!json);
        } else {
            panic!("Expected Query command");
        }
    }

    #[test]
    fn test_cli_summarize_needs_exactly_one_target() {
        assert!(Cli::try_parse_from(["recall", "summarize"]).is_err());
        assert!(Cli::try_parse_from(["recall", "summarize", "--session", "s", "--pending"]).is_err());
        assert!(Cli::try_parse_from(["recall", "summarize", "--worker"]).is_err());

        let cli = Cli::try_parse_from(["recall", "summarize", "--session", "s1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Summarize { session: Some(ref s), pending: false, worker: false } if s == "s1"
        ));
        let cli = Cli::try_parse_from(["recall", "summarize", "--pending", "--worker"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Summarize { session: None, pending: true, worker: true }
        ));
    }

    #[test]
    fn test_cli_parse_pin_with_note() {
        let cli = Cli::try_parse_from(["recall", "pin", "42", "--note", "flaky test"]).unwrap();
        if let Commands::Pin { id, note } = cli.command {
            assert_eq!(id, 42);
            assert_eq!(note.as_deref(), Some("flaky test"));
        } else {
            panic!("Expected Pin command");
        }
    }

    #[test]
    fn test_cli_parse_maintain_flags() {
        let cli = Cli::try_parse_from(["recall", "maintain", "--no-prune", "--reredact"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Maintain { no_prune: true, reredact: true, json: false }
        ));
    }
}
