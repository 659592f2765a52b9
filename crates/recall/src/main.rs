mod cli;
mod commands;
mod worker;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Exit;
use std::process::ExitCode;

/// Environment variable holding the log filter
const LOG_ENV: &str = "RECALL_LOG";

fn main() -> ExitCode {
    // stdout belongs to the host; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::HookSessionStart => commands::hooks::session_start(),
        Commands::HookCapture => commands::hooks::capture(),
        Commands::HookSessionEnd => commands::hooks::session_end(),
        Commands::Status { json } => commands::status::run(json),
        Commands::Maintain {
            no_prune,
            reredact,
            json,
        } => commands::maintain::run(no_prune, reredact, json),
        Commands::Query {
            text,
            files,
            limit,
            json,
        } => commands::query::run(&text, &files, limit, json),
        Commands::Summarize {
            session,
            pending,
            worker,
        } => commands::summarize::run(session.as_deref(), pending, worker),
        Commands::Pin { id, note } => commands::pin::pin(id, note.as_deref()),
        Commands::Unpin { id } => commands::pin::unpin(id),
        Commands::Init => commands::init::run(),
        Commands::Version => commands::version::run(),
    };

    match result {
        Ok(exit) => exit.into(),
        Err(e) => {
            eprintln!("recall: {e:#}");
            Exit::Refused.into()
        }
    }
}
