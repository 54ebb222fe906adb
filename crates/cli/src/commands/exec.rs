use clap::Args;
use dbt_runner_core::config::{LoadOptions, RunnerConfig};
use dbt_runner_core::{CommandRequest, CommandRunner};

use crate::commands::{
    current_thread_runtime, CommandOutput, EXIT_COMMAND_FAILED, EXIT_INVALID_INPUT,
    EXIT_RUNTIME_INIT,
};
use crate::logging;

#[derive(Debug, Clone, Default, Args)]
pub struct ExecArgs {
    #[arg(help = "dbt operation: run|test|list|compile|deps|snapshot|seed|clean|debug|docs")]
    pub operation: String,
    #[arg(long, help = "Models to target; takes precedence over --select")]
    pub models: Option<String>,
    #[arg(long, help = "dbt node selection syntax")]
    pub select: Option<String>,
    #[arg(long, help = "Nodes to exclude")]
    pub exclude: Option<String>,
    #[arg(long, help = "Rebuild incremental models from scratch")]
    pub full_refresh: bool,
    #[arg(long, help = "Stop at the first failure")]
    pub fail_fast: bool,
    #[arg(long, help = "dbt project directory (defaults to dbt.project_dir)")]
    pub project_dir: Option<String>,
    #[arg(long, help = "dbt profiles directory (defaults to dbt.profiles_dir)")]
    pub profiles_dir: Option<String>,
    #[arg(long, help = "Pretty-print the JSON report")]
    pub pretty: bool,
}

impl ExecArgs {
    fn to_request(&self) -> Result<CommandRequest, dbt_runner_core::RequestError> {
        let mut request = CommandRequest::parse(&self.operation)?
            .with_full_refresh(self.full_refresh)
            .with_fail_fast(self.fail_fast);
        request.target_models = self.models.clone();
        request.selector = self.select.clone();
        request.excluder = self.exclude.clone();
        request.project_directory = self.project_dir.clone();
        request.profiles_directory = self.profiles_dir.clone();
        Ok(request)
    }
}

pub fn run(options: LoadOptions, args: &ExecArgs) -> CommandOutput {
    let request = match args.to_request() {
        Ok(request) => request,
        Err(error) => {
            return CommandOutput::failure(
                "exec",
                "invalid_request",
                error.to_string(),
                EXIT_INVALID_INPUT,
            );
        }
    };

    let config = match RunnerConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandOutput::failure(
                "exec",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_INVALID_INPUT,
            );
        }
    };
    logging::init(&config);

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandOutput::failure(
                "exec",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME_INIT,
            );
        }
    };

    let runner = CommandRunner::from_config(&config);
    let result = runtime.block_on(runner.execute(&request));
    let report = result.report();

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    };

    match rendered {
        Ok(output) => CommandOutput {
            exit_code: if result.succeeded { 0 } else { EXIT_COMMAND_FAILED },
            output,
        },
        Err(error) => CommandOutput::failure(
            "exec",
            "serialization",
            format!("could not serialize command report: {error}"),
            EXIT_COMMAND_FAILED,
        ),
    }
}
