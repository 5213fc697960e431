use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use coldsnap::cli::{
    handle_check_command, handle_list_command, handle_pipeline_command, handle_prune_dry_run,
};
use coldsnap::config::paths::CONFIG_ENV_VAR;
use coldsnap::config::ColdsnapPaths;
use coldsnap::logging::init_tracing;
use coldsnap::pipeline::Command;
use coldsnap::ColdsnapError;

/// Exit code for an invalid or unreadable configuration
const EXIT_CONFIG_ERROR: u8 = 2;

/// Exit code for any other failure before or outside the pipeline
const EXIT_FAILURE: u8 = 1;

#[derive(Parser)]
#[command(
    name = "coldsnap",
    version,
    about = "Cold backups for services and container groups",
    long_about = "coldsnap stops the configured workloads, archives their data into a \
                  timestamped snapshot, starts them again, and prunes old snapshots \
                  under a retention policy."
)]
struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug-level console output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stop workloads, archive, restart, and prune
    Run,

    /// Stop workloads, archive, and restart without pruning
    Backup,

    /// Apply the retention policy to the snapshot store
    Prune {
        /// Show what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List snapshots with age and size
    #[command(alias = "ls")]
    List {
        /// Show the archives inside each snapshot
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate the configuration and print a summary
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let is_config = err
                .downcast_ref::<ColdsnapError>()
                .is_some_and(ColdsnapError::is_config);
            if is_config {
                ExitCode::from(EXIT_CONFIG_ERROR)
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let paths = ColdsnapPaths::resolve(cli.config);

    match cli.command {
        Commands::Run => Ok(handle_pipeline_command(&paths, Command::Run)?.exit_code()),
        Commands::Backup => Ok(handle_pipeline_command(&paths, Command::Backup)?.exit_code()),
        Commands::Prune { dry_run: true } => {
            handle_prune_dry_run(&paths)?;
            Ok(0)
        }
        Commands::Prune { dry_run: false } => {
            Ok(handle_pipeline_command(&paths, Command::Prune)?.exit_code())
        }
        Commands::List { verbose } => {
            handle_list_command(&paths, verbose)?;
            Ok(0)
        }
        Commands::Check => {
            handle_check_command(&paths)?;
            Ok(0)
        }
    }
}
