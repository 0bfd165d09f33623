use clap::Parser;

use crate::output::OutputMode;

/// Run pre-commit hooks, lint auto-fixes and the formatter across the
/// current repository.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to use (defaults to ./tidyup.toml when present)
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Override default per-task timeout (e.g., "5m", "30s", "1h30m")
    #[arg(short = 't', long = "timeout")]
    pub timeout: Option<String>,

    /// Resolve the repository root and show what would be executed
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// How to display tool output in the terminal
    #[arg(long = "output", value_enum)]
    pub output: Option<OutputMode>,

    /// Print a JSON report of every step to stdout when finished
    #[arg(long = "json")]
    pub json: bool,
}
