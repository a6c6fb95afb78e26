//! Command line entry point
//!
//! - `archive-organizer watch <dir>` watches a folder until SIGTERM/SIGINT
//! - `archive-organizer process <file>` organizes one archive into its own folder

use archive_organizer::{ArchiveWatcher, Config, Organizer, run_until_signal};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch a folder and organize archives as they finish downloading
    Watch {
        /// Folder to watch (defaults to the configured root)
        dir: Option<PathBuf>,

        /// Also pick up archives already in the folder
        #[arg(long)]
        scan_existing: bool,
    },
    /// Organize a single archive right away
    Process {
        /// Archive to process; output goes next to it
        file: PathBuf,
    },
}

fn load_config(args: &Args) -> archive_organizer::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Command::Watch { dir, scan_existing } => {
            if let Some(dir) = dir {
                config.watch.root = dir;
            }
            config.watch.scan_existing_on_start |= scan_existing;

            let mut watcher = match ArchiveWatcher::new(config) {
                Ok(w) => w,
                Err(e) => {
                    tracing::error!(error = %e, "invalid configuration");
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = watcher.start() {
                tracing::error!(error = %e, "failed to start watcher");
                return ExitCode::FAILURE;
            }

            run_until_signal(&mut watcher).await;
            ExitCode::SUCCESS
        }
        Command::Process { file } => {
            let root = file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));

            let organizer = match Organizer::new(root, config.organize) {
                Ok(o) => o,
                Err(e) => {
                    tracing::error!(error = %e, "invalid configuration");
                    return ExitCode::FAILURE;
                }
            };

            let report = organizer.process(&file).await;
            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(organized) => tracing::info!(
                        archive = %outcome.archive.display(),
                        disposition = organized.disposition.label(),
                        "done"
                    ),
                    Err(e) => tracing::error!(
                        archive = %outcome.archive.display(),
                        error = %e,
                        "failed"
                    ),
                }
            }

            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
