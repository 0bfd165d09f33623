use clap::Parser;
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod error;
mod execution;
mod output;
mod task;
mod util;
mod vcs;

use cli::Cli;
use error::Result;
use execution::TaskRunner;
use output::{OutputMode, Progress};
use task::load_configuration;
use util::display_command;
use vcs::RepoRoot;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_tracing(args.verbose);

    if let Err(e) = run_tidyup(args).await {
        if e.reported_by_tool() {
            tracing::debug!(error = %e, "aborted");
        } else {
            eprintln!("Error: {}", e);
        }
        process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "tidyup=debug" } else { "tidyup=warn" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_tidyup(args: Cli) -> Result<()> {
    let config = load_configuration(args.file.as_deref())?;
    let root = RepoRoot::resolve(&config.root_command, None).await?;
    let tasks = config.resolve_tasks(root.path());

    // With --json stdout carries only the report.
    let progress = if args.json {
        Progress::Stderr
    } else {
        Progress::Stdout
    };

    if args.verbose {
        progress.line(&format!("Repository root: {}", root.path().display()));
        let order: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        progress.line(&format!("Task execution order: {}", order.join(" -> ")));
    }

    if args.dry_run {
        println!("Dry run mode - showing what would be executed:");
        for task in &tasks {
            let policy = if task.is_fault_tolerant() {
                " (continue on error)"
            } else {
                ""
            };
            println!(
                "  {} would run: {}{}",
                task.id,
                display_command(&task.command),
                policy
            );
        }
        return Ok(());
    }

    let output_mode = if args.json {
        OutputMode::Group
    } else {
        args.output.or(config.output).unwrap_or_default()
    };
    let default_timeout = args.timeout.or(config.default_timeout);

    let runner = TaskRunner::new(&tasks, &root, default_timeout, output_mode, progress);
    let report = runner.run_tasks().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    report.into_result()
}
