//! Paths, JSONL side-channel diagnostics and atomic file operations

mod io;
mod paths;
mod types;

pub use io::{append_jsonl, atomic_write, read_jsonl, read_jsonl_tail};
pub use paths::{changed_files, Paths, CONFIG_ENV, DB_ENV};
pub use types::{Diagnostic, DiagnosticLog};
