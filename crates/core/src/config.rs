use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "dbt-runner.toml";
pub const NESTED_CONFIG_FILE: &str = "config/dbt-runner.toml";

const MAX_COMMAND_TIMEOUT_SECS: u64 = 3600;

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub dbt: DbtConfig,
    pub timeouts: TimeoutConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DbtConfig {
    pub program: String,
    pub project_dir: Option<String>,
    pub profiles_dir: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TimeoutConfig {
    pub command_secs: u64,
    pub structured_output_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub program: Option<String>,
    pub project_dir: Option<String>,
    pub profiles_dir: Option<String>,
    pub command_timeout_secs: Option<u64>,
    pub structured_output_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            dbt: DbtConfig { program: "dbt".to_string(), project_dir: None, profiles_dir: None },
            timeouts: TimeoutConfig { command_secs: 300, structured_output_secs: 60 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl RunnerConfig {
    /// Layers defaults, the config file, `DBT_RUNNER_*` variables and
    /// explicit overrides, in that order, then validates.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(dbt) = patch.dbt {
            if let Some(program) = dbt.program {
                self.dbt.program = program;
            }
            if let Some(project_dir) = dbt.project_dir {
                self.dbt.project_dir = non_blank(project_dir);
            }
            if let Some(profiles_dir) = dbt.profiles_dir {
                self.dbt.profiles_dir = non_blank(profiles_dir);
            }
        }

        if let Some(timeouts) = patch.timeouts {
            if let Some(command_secs) = timeouts.command_secs {
                self.timeouts.command_secs = command_secs;
            }
            if let Some(structured_output_secs) = timeouts.structured_output_secs {
                self.timeouts.structured_output_secs = structured_output_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DBT_RUNNER_PROGRAM") {
            self.dbt.program = value;
        }
        if let Some(value) = read_env("DBT_RUNNER_PROJECT_DIR") {
            self.dbt.project_dir = Some(value);
        }
        if let Some(value) = read_env("DBT_RUNNER_PROFILES_DIR") {
            self.dbt.profiles_dir = Some(value);
        }

        if let Some(value) = read_env("DBT_RUNNER_COMMAND_TIMEOUT_SECS") {
            self.timeouts.command_secs = parse_u64("DBT_RUNNER_COMMAND_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DBT_RUNNER_STRUCTURED_OUTPUT_TIMEOUT_SECS") {
            self.timeouts.structured_output_secs =
                parse_u64("DBT_RUNNER_STRUCTURED_OUTPUT_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("DBT_RUNNER_LOGGING_LEVEL").or_else(|| read_env("DBT_RUNNER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DBT_RUNNER_LOGGING_FORMAT").or_else(|| read_env("DBT_RUNNER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(program) = overrides.program {
            self.dbt.program = program;
        }
        if let Some(project_dir) = overrides.project_dir {
            self.dbt.project_dir = non_blank(project_dir);
        }
        if let Some(profiles_dir) = overrides.profiles_dir {
            self.dbt.profiles_dir = non_blank(profiles_dir);
        }
        if let Some(command_timeout_secs) = overrides.command_timeout_secs {
            self.timeouts.command_secs = command_timeout_secs;
        }
        if let Some(structured_output_timeout_secs) = overrides.structured_output_timeout_secs {
            self.timeouts.structured_output_secs = structured_output_timeout_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_dbt(&self.dbt)?;
        validate_timeouts(&self.timeouts)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Explicit path if it exists, otherwise the first well-known location found.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_dbt(dbt: &DbtConfig) -> Result<(), ConfigError> {
    if dbt.program.trim().is_empty() {
        return Err(ConfigError::Validation("dbt.program must not be empty".to_string()));
    }

    Ok(())
}

fn validate_timeouts(timeouts: &TimeoutConfig) -> Result<(), ConfigError> {
    if timeouts.command_secs == 0 || timeouts.command_secs > MAX_COMMAND_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "timeouts.command_secs must be in range 1..={MAX_COMMAND_TIMEOUT_SECS}"
        )));
    }

    if timeouts.structured_output_secs == 0
        || timeouts.structured_output_secs > timeouts.command_secs
    {
        return Err(ConfigError::Validation(
            "timeouts.structured_output_secs must be in range 1..=timeouts.command_secs"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn non_blank(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    dbt: Option<DbtPatch>,
    timeouts: Option<TimeoutPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DbtPatch {
    program: Option<String>,
    project_dir: Option<String>,
    profiles_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeoutPatch {
    command_secs: Option<u64>,
    structured_output_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
