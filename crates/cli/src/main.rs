use std::process::ExitCode;

fn main() -> ExitCode {
    dbt_runner_cli::run()
}
