use dbt_runner_core::config::{LoadOptions, RunnerConfig};
use dbt_runner_core::{CommandResult, CommandRunner, HealthReport};
use serde::Serialize;

use crate::commands::{current_thread_runtime, escape_json, CommandOutput, EXIT_COMMAND_FAILED};
use crate::logging;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct HealthCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct HealthSummary {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<HealthCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandOutput {
    let summary = build_summary(options);
    let exit_code =
        if summary.overall_status == CheckStatus::Pass { 0 } else { EXIT_COMMAND_FAILED };

    if json_output {
        let output = serde_json::to_string_pretty(&summary).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"health serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandOutput { exit_code, output };
    }

    CommandOutput { exit_code, output: render_human(&summary) }
}

fn build_summary(options: LoadOptions) -> HealthSummary {
    let mut checks = Vec::new();

    match RunnerConfig::load(options) {
        Ok(config) => {
            logging::init(&config);
            checks.push(HealthCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_project(&config));
        }
        Err(error) => {
            checks.push(HealthCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["program_on_path", "dbt_debug", "dbt_list"] {
                checks.push(skipped(name, "skipped because configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "health: dbt project appears to be configured correctly".to_string()
    } else {
        "health: one or more readiness checks failed".to_string()
    };

    HealthSummary { overall_status, summary, checks }
}

fn check_project(config: &RunnerConfig) -> Vec<HealthCheck> {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                HealthCheck {
                    name: "program_on_path",
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                },
                skipped("dbt_debug", "skipped because the async runtime did not start"),
                skipped("dbt_list", "skipped because the async runtime did not start"),
            ];
        }
    };

    let runner = CommandRunner::from_config(config);
    let report: HealthReport = runtime.block_on(runner.health_check());

    let program_check = match &report.program_path {
        Some(path) => HealthCheck {
            name: "program_on_path",
            status: CheckStatus::Pass,
            details: format!("found `{}`", path.display()),
        },
        None => HealthCheck {
            name: "program_on_path",
            status: CheckStatus::Fail,
            details: format!("`{}` was not found on PATH", runner.program()),
        },
    };

    vec![
        program_check,
        invocation_check("dbt_debug", &report.debug),
        invocation_check("dbt_list", &report.model_list),
    ]
}

fn invocation_check(name: &'static str, result: &CommandResult) -> HealthCheck {
    if result.succeeded {
        return HealthCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("`{}` succeeded in {}ms", result.command_string(), result.elapsed_ms),
        };
    }

    let details = match (&result.failure_reason, result.exit_code) {
        (Some(reason), _) => format!("`{}`: {reason}", result.command_string()),
        (None, Some(code)) => {
            let tail = last_non_empty_line(&result.standard_error)
                .or_else(|| last_non_empty_line(&result.standard_output))
                .unwrap_or("no output");
            format!("`{}` exited with code {code}: {tail}", result.command_string())
        }
        (None, None) => format!("`{}` was terminated by a signal", result.command_string()),
    };

    HealthCheck { name, status: CheckStatus::Fail, details }
}

fn last_non_empty_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

fn skipped(name: &'static str, details: &str) -> HealthCheck {
    HealthCheck { name, status: CheckStatus::Skipped, details: details.to_string() }
}

fn render_human(summary: &HealthSummary) -> String {
    let mut lines = Vec::new();
    lines.push(summary.summary.clone());

    for check in &summary.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
