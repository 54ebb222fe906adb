use std::env;
use std::fs;
use std::path::Path;

use dbt_runner_core::config::{resolve_config_path, LoadOptions, RunnerConfig};
use toml::Value;

struct Field<'a> {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: &'a str,
}

pub fn run(options: LoadOptions) -> String {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match RunnerConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let command_secs = config.timeouts.command_secs.to_string();
    let structured_output_secs = config.timeouts.structured_output_secs.to_string();

    let fields = [
        Field {
            key_path: "dbt.program",
            env_keys: &["DBT_RUNNER_PROGRAM"],
            value: &config.dbt.program,
        },
        Field {
            key_path: "dbt.project_dir",
            env_keys: &["DBT_RUNNER_PROJECT_DIR"],
            value: config.dbt.project_dir.as_deref().unwrap_or("<unset>"),
        },
        Field {
            key_path: "dbt.profiles_dir",
            env_keys: &["DBT_RUNNER_PROFILES_DIR"],
            value: config.dbt.profiles_dir.as_deref().unwrap_or("<unset>"),
        },
        Field {
            key_path: "timeouts.command_secs",
            env_keys: &["DBT_RUNNER_COMMAND_TIMEOUT_SECS"],
            value: &command_secs,
        },
        Field {
            key_path: "timeouts.structured_output_secs",
            env_keys: &["DBT_RUNNER_STRUCTURED_OUTPUT_TIMEOUT_SECS"],
            value: &structured_output_secs,
        },
        Field {
            key_path: "logging.level",
            env_keys: &["DBT_RUNNER_LOGGING_LEVEL", "DBT_RUNNER_LOG_LEVEL"],
            value: &config.logging.level,
        },
        Field {
            key_path: "logging.format",
            env_keys: &["DBT_RUNNER_LOGGING_FORMAT", "DBT_RUNNER_LOG_FORMAT"],
            value: config.logging.format.as_str(),
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, field.value, source));
    }

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let set_env_key = env_keys
        .iter()
        .find(|env_key| env::var(env_key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = set_env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
