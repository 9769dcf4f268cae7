use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tidywatch::cli::{OrganizeCommand, run_cli, run_watch};
use tidywatch::output::OutputFormatter;
use tracing_subscriber::EnvFilter;

/// Keep folders tidy with prioritized rules, category fallback and undo.
#[derive(Debug, Parser)]
#[command(name = "tidywatch", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Organize a directory once.
    Organize {
        dir: PathBuf,
        /// Show what would happen without touching any file.
        #[arg(long)]
        dry_run: bool,
        /// Configuration file to use instead of the default lookup.
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Revert the last `organize` run in a directory.
    Undo { dir: PathBuf },
    /// Watch directories and report (or organize) changes until Ctrl-C.
    Watch {
        /// Directories to watch. Defaults to the configured folders.
        dirs: Vec<PathBuf>,
        /// Organize new and changed files automatically.
        #[arg(long)]
        auto: bool,
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tidywatch=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let result = match args.command {
        Command::Organize { dir, dry_run, config } => {
            run_cli(OrganizeCommand::Organize { dry_run }, &dir, config.as_deref())
        }
        Command::Undo { dir } => run_cli(OrganizeCommand::Undo, &dir, None),
        Command::Watch { dirs, auto, config } => match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime.block_on(run_watch(&dirs, auto, config.as_deref())),
            Err(e) => Err(format!("Cannot start the async runtime: {e}")),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e);
            ExitCode::FAILURE
        }
    }
}
