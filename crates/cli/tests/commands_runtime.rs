use std::env;
use std::sync::{Mutex, OnceLock};

use dbt_runner_cli::commands::exec::ExecArgs;
use dbt_runner_cli::commands::{config, exec, health, operations};
use dbt_runner_cli::load_options;
use dbt_runner_core::config::LoadOptions;
use serde_json::Value;

#[test]
fn operations_lists_every_supported_operation() {
    let output = operations::run();
    let names: Vec<&str> =
        output.lines().filter_map(|line| line.split_whitespace().next()).collect();

    assert_eq!(
        names,
        vec![
            "run", "test", "list", "compile", "deps", "snapshot", "seed", "clean", "debug",
            "docs"
        ]
    );
}

#[test]
fn exec_rejects_unknown_operation_before_loading_config() {
    with_env(&[("DBT_RUNNER_COMMAND_TIMEOUT_SECS", "not-a-number")], || {
        let args = ExecArgs { operation: "destroy".to_string(), ..ExecArgs::default() };
        let result = exec::run(LoadOptions::default(), &args);
        assert_eq!(result.exit_code, 2, "expected invalid input exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "exec");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_request");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("destroy"), "message should name the operation: {message}");
    });
}

#[test]
fn exec_returns_config_failure_for_invalid_timeout() {
    with_env(&[("DBT_RUNNER_COMMAND_TIMEOUT_SECS", "0")], || {
        let args = ExecArgs { operation: "run".to_string(), ..ExecArgs::default() };
        let result = exec::run(LoadOptions::default(), &args);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "exec");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn exec_reports_launch_failure_for_missing_program() {
    with_env(&[("DBT_RUNNER_PROGRAM", "dbt-runner-cli-test-no-such-program")], || {
        let args = ExecArgs { operation: "debug".to_string(), ..ExecArgs::default() };
        let result = exec::run(LoadOptions::default(), &args);
        assert_eq!(result.exit_code, 1, "expected command failure exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "dbt-runner-cli-test-no-such-program debug");
        assert_eq!(payload["success"], false);
        assert_eq!(payload["return_code"], Value::Null);
        let error = payload["error"].as_str().unwrap_or_default();
        assert!(error.contains("failed to launch"), "unexpected error: {error}");
    });
}

#[cfg(unix)]
#[test]
fn exec_runs_configured_program_and_prints_report() {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    // The script is written under the env lock so no sibling test forks
    // while the executable is still open for writing.
    with_env(&[("DBT_RUNNER_PROJECT_DIR", "/srv/analytics")], || {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let program = dir.path().join("dbt");
        fs::write(&program, "#!/bin/sh\necho \"ran: $*\"\n").expect("write fake dbt");
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755))
            .expect("mark fake dbt executable");
        let program = program.display().to_string();
        env::set_var("DBT_RUNNER_PROGRAM", &program);

        let args = ExecArgs {
            operation: "run".to_string(),
            select: Some("tag:daily".to_string()),
            fail_fast: true,
            ..ExecArgs::default()
        };
        let result = exec::run(LoadOptions::default(), &args);
        assert_eq!(result.exit_code, 0, "expected successful run: {}", result.output);

        let payload = parse_payload(&result.output);
        let expected =
            format!("{program} run --select tag:daily --fail-fast --project-dir /srv/analytics");
        assert_eq!(payload["command"], expected.as_str());
        assert_eq!(payload["return_code"], 0);
        assert_eq!(payload["success"], true);
        assert_eq!(
            payload["stdout"],
            "ran: run --select tag:daily --fail-fast --project-dir /srv/analytics\n"
        );
        assert!(payload.get("error").is_none());
        assert!(payload.get("json_output").is_none());
    });
}

#[test]
fn exec_fails_when_explicit_config_file_is_missing() {
    with_env(&[], || {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let missing = dir.path().join("absent.toml");

        let args = ExecArgs { operation: "run".to_string(), ..ExecArgs::default() };
        let result = exec::run(load_options(Some(missing)), &args);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("absent.toml"), "message should name the path: {message}");
    });
}

#[test]
fn config_loads_explicit_file_and_attributes_its_values() {
    with_env(&[], || {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = dir.path().join("dbt-runner.toml");
        std::fs::write(&path, "[dbt]\nprogram = \"/opt/dbt/bin/dbt\"\n").expect("write config");

        let output = config::run(load_options(Some(path.clone())));
        let expected =
            format!("- dbt.program = /opt/dbt/bin/dbt (source: file ({}))", path.display());
        assert!(output.contains(&expected), "unexpected config output:\n{output}");
    });
}

#[test]
fn config_reports_env_source_for_overridden_values() {
    with_env(&[("DBT_RUNNER_COMMAND_TIMEOUT_SECS", "120")], || {
        let output = config::run(LoadOptions::default());

        assert!(
            output.contains(
                "- timeouts.command_secs = 120 (source: env (DBT_RUNNER_COMMAND_TIMEOUT_SECS))"
            ),
            "unexpected config output:\n{output}"
        );
        assert!(output.contains("- dbt.program = dbt (source: default)"));
    });
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("DBT_RUNNER_LOGGING_LEVEL", "verbose")], || {
        let output = config::run(LoadOptions::default());
        assert!(output.starts_with("config validation failed:"), "unexpected output: {output}");
    });
}

#[test]
fn health_fails_when_program_is_missing() {
    with_env(&[("DBT_RUNNER_PROGRAM", "dbt-runner-cli-test-no-such-program")], || {
        let result = health::run(LoadOptions::default(), true);
        assert_eq!(result.exit_code, 1, "expected failed health exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");

        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("config_validation"), "pass");
        assert_eq!(status_of("program_on_path"), "fail");
        assert_eq!(status_of("dbt_debug"), "fail");
        assert_eq!(status_of("dbt_list"), "fail");
    });
}

#[test]
fn health_skips_project_checks_when_config_is_invalid() {
    with_env(&[("DBT_RUNNER_LOG_FORMAT", "xml")], || {
        let result = health::run(LoadOptions::default(), true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        let statuses: Vec<Value> = payload["checks"]
            .as_array()
            .map(|checks| checks.iter().map(|check| check["status"].clone()).collect())
            .unwrap_or_default();
        assert_eq!(statuses, vec!["fail", "skipped", "skipped", "skipped"]);
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DBT_RUNNER_PROGRAM",
        "DBT_RUNNER_PROJECT_DIR",
        "DBT_RUNNER_PROFILES_DIR",
        "DBT_RUNNER_COMMAND_TIMEOUT_SECS",
        "DBT_RUNNER_STRUCTURED_OUTPUT_TIMEOUT_SECS",
        "DBT_RUNNER_LOGGING_LEVEL",
        "DBT_RUNNER_LOGGING_FORMAT",
        "DBT_RUNNER_LOG_LEVEL",
        "DBT_RUNNER_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
