pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dbt_runner_core::config::LoadOptions;

use crate::commands::exec::ExecArgs;

#[derive(Debug, Parser)]
#[command(
    name = "dbt-runner",
    about = "Run dbt commands from structured options",
    long_about = "Assemble dbt command lines from structured options, run them with a bounded wait, and report the outcome as JSON.",
    after_help = "Examples:\n  dbt-runner exec run --select tag:daily --fail-fast\n  dbt-runner exec list --pretty\n  dbt-runner health --json\n  dbt-runner config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a dbt-runner.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one dbt operation and print the JSON report")]
    Exec(ExecArgs),
    #[command(about = "List the dbt operations this runner accepts")]
    Operations,
    #[command(about = "Run `dbt debug` and `dbt list` to check project readiness")]
    Health {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

/// An explicit `--config` path must exist; without one the well-known
/// locations are optional.
pub fn load_options(config_path: Option<PathBuf>) -> LoadOptions {
    LoadOptions { require_file: config_path.is_some(), config_path, ..LoadOptions::default() }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = load_options(cli.config);

    let result = match cli.command {
        Command::Exec(args) => commands::exec::run(options, &args),
        Command::Operations => {
            commands::CommandOutput { exit_code: 0, output: commands::operations::run() }
        }
        Command::Health { json } => commands::health::run(options, json),
        Command::Config => {
            commands::CommandOutput { exit_code: 0, output: commands::config::run(options) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
