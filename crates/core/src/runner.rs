//! Launches dbt as a child process and turns every outcome into a
//! [`CommandResult`].
//!
//! `execute` never returns an error. Launch failures, timeouts and pipe
//! failures are recorded in `failure_reason`; a non-zero exit is an ordinary
//! result with `succeeded == false`.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::command_line::{CommandLine, DirectoryDefaults};
use crate::config::RunnerConfig;
use crate::domain::request::CommandRequest;
use crate::domain::result::{CommandResult, FailureReason};
use crate::errors::StructuredOutputError;

pub const DEFAULT_PROGRAM: &str = "dbt";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_STRUCTURED_OUTPUT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub command: Duration,
    pub structured_output: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND_TIMEOUT,
            structured_output: DEFAULT_STRUCTURED_OUTPUT_TIMEOUT,
        }
    }
}

/// Builds and runs dbt invocations.
///
/// Holds only immutable settings, so one runner can serve concurrent callers;
/// every `execute` spawns its own child.
#[derive(Clone, Debug)]
pub struct CommandRunner {
    program: String,
    defaults: DirectoryDefaults,
    timeouts: Timeouts,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl CommandRunner {
    pub fn new(default_project_dir: Option<String>, default_profiles_dir: Option<String>) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            defaults: DirectoryDefaults {
                project_dir: default_project_dir.filter(|value| !value.trim().is_empty()),
                profiles_dir: default_profiles_dir.filter(|value| !value.trim().is_empty()),
            },
            timeouts: Timeouts::default(),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.dbt.project_dir.clone(), config.dbt.profiles_dir.clone())
            .with_program(config.dbt.program.clone())
            .with_timeouts(Timeouts {
                command: Duration::from_secs(config.timeouts.command_secs),
                structured_output: Duration::from_secs(config.timeouts.structured_output_secs),
            })
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn defaults(&self) -> &DirectoryDefaults {
        &self.defaults
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn command_line(&self, request: &CommandRequest) -> CommandLine {
        CommandLine::assemble(&self.program, request, &self.defaults)
    }

    /// Runs the request to completion or timeout.
    ///
    /// For `list`, a successful run is followed by a best-effort
    /// `--output json` invocation whose stdout lands in `structured_output`.
    /// `elapsed_ms` covers both invocations.
    pub async fn execute(&self, request: &CommandRequest) -> CommandResult {
        let invocation_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let line = self.command_line(request);

        if request.selector_is_shadowed() {
            warn!(
                event_name = "runner.selection.selector_shadowed",
                invocation_id = %invocation_id,
                selector = request.selector.as_deref().unwrap_or_default(),
                "selector ignored because target models were also given"
            );
        }

        info!(
            event_name = "runner.command.started",
            invocation_id = %invocation_id,
            operation = %request.operation,
            command = %line,
            timeout_secs = self.timeouts.command.as_secs(),
            "launching dbt command"
        );

        let invocation = invoke(&line, self.timeouts.command).await;
        let mut result = CommandResult {
            invocation_id,
            started_at,
            elapsed_ms: 0,
            invoked_command_line: line.tokens().to_vec(),
            exit_code: None,
            standard_output: String::new(),
            standard_error: String::new(),
            succeeded: false,
            structured_output: None,
            failure_reason: None,
        };

        match invocation {
            Invocation::Completed { exit_code, stdout, stderr } => {
                result.exit_code = exit_code;
                result.succeeded = exit_code == Some(0);
                result.standard_output = stdout;
                result.standard_error = stderr;
                info!(
                    event_name = "runner.command.completed",
                    invocation_id = %invocation_id,
                    exit_code = ?exit_code,
                    succeeded = result.succeeded,
                    elapsed_ms = elapsed_ms(started),
                    "dbt command finished"
                );
            }
            Invocation::TimedOut => {
                let after_secs = self.timeouts.command.as_secs();
                result.failure_reason = Some(FailureReason::Timeout { after_secs });
                warn!(
                    event_name = "runner.command.timed_out",
                    invocation_id = %invocation_id,
                    timeout_secs = after_secs,
                    "dbt command timed out and was terminated"
                );
            }
            Invocation::LaunchFailed(detail) => {
                error!(
                    event_name = "runner.command.launch_failed",
                    invocation_id = %invocation_id,
                    error = %detail,
                    "dbt command could not be launched"
                );
                result.failure_reason = Some(FailureReason::Launch(detail));
            }
            Invocation::CollectFailed(detail) => {
                error!(
                    event_name = "runner.command.io_failed",
                    invocation_id = %invocation_id,
                    error = %detail,
                    "dbt command output could not be collected"
                );
                result.failure_reason = Some(FailureReason::Io(detail));
            }
        }

        if request.operation.has_structured_output()
            && result.succeeded
            && !line.requests_structured_output()
        {
            // Best effort: a failure here leaves the primary result untouched.
            match self.fetch_structured_output(&line).await {
                Ok(structured) => {
                    info!(
                        event_name = "runner.structured_output.attached",
                        invocation_id = %invocation_id,
                        bytes = structured.len(),
                        "attached structured list output"
                    );
                    result.structured_output = Some(structured);
                }
                Err(reason) => {
                    warn!(
                        event_name = "runner.structured_output.skipped",
                        invocation_id = %invocation_id,
                        reason = %reason,
                        "structured list output unavailable; returning plain output only"
                    );
                }
            }
        }

        result.elapsed_ms = elapsed_ms(started);
        result
    }

    async fn fetch_structured_output(
        &self,
        line: &CommandLine,
    ) -> Result<String, StructuredOutputError> {
        let structured = line.with_structured_output();
        debug!(command = %structured, "requesting structured list output");

        match invoke(&structured, self.timeouts.structured_output).await {
            Invocation::Completed { exit_code: Some(0), stdout, .. } => Ok(stdout),
            Invocation::Completed { exit_code, .. } => {
                Err(StructuredOutputError::NonZeroExit { exit_code })
            }
            Invocation::TimedOut => Err(StructuredOutputError::Timeout {
                after_secs: self.timeouts.structured_output.as_secs(),
            }),
            Invocation::LaunchFailed(detail) => Err(StructuredOutputError::Launch(detail)),
            Invocation::CollectFailed(detail) => Err(StructuredOutputError::Io(detail)),
        }
    }
}

enum Invocation {
    Completed { exit_code: Option<i32>, stdout: String, stderr: String },
    TimedOut,
    LaunchFailed(String),
    CollectFailed(String),
}

async fn invoke(line: &CommandLine, bound: Duration) -> Invocation {
    let mut command = Command::new(line.program());
    command
        .args(line.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => return Invocation::LaunchFailed(format!("`{}`: {error}", line.program())),
    };

    let outcome = timeout(bound, collect(&mut child)).await;
    match outcome {
        Ok(Ok((status, stdout, stderr))) => {
            Invocation::Completed { exit_code: status.code(), stdout, stderr }
        }
        Ok(Err(error)) => {
            terminate(&mut child).await;
            Invocation::CollectFailed(error.to_string())
        }
        Err(_) => {
            terminate(&mut child).await;
            Invocation::TimedOut
        }
    }
}

async fn collect(child: &mut Child) -> io::Result<(ExitStatus, String, String)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    tokio::try_join!(child.wait(), read_text(stdout), read_text(stderr))
}

async fn read_text<R>(stream: Option<R>) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buffer).await?;
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Kills and reaps the child.
async fn terminate(child: &mut Child) {
    if let Err(error) = child.kill().await {
        debug!(error = %error, "child process was already gone when terminating");
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{CommandRunner, Timeouts, DEFAULT_PROGRAM};
    use crate::domain::operation::Operation;
    use crate::domain::request::CommandRequest;

    #[test]
    fn defaults_match_documented_bounds() {
        let runner = CommandRunner::default();

        assert_eq!(runner.program(), DEFAULT_PROGRAM);
        assert_eq!(runner.timeouts().command, Duration::from_secs(300));
        assert_eq!(runner.timeouts().structured_output, Duration::from_secs(60));
        assert_eq!(runner.defaults().project_dir, None);
    }

    #[test]
    fn blank_default_directories_are_dropped() {
        let runner = CommandRunner::new(Some("  ".to_string()), Some("/etc/dbt".to_string()));

        assert_eq!(runner.defaults().project_dir, None);
        assert_eq!(runner.defaults().profiles_dir.as_deref(), Some("/etc/dbt"));
    }

    #[test]
    fn command_line_uses_configured_program() {
        let runner = CommandRunner::new(Some("/srv/project".to_string()), None)
            .with_program("/opt/dbt/bin/dbt")
            .with_timeouts(Timeouts {
                command: Duration::from_secs(5),
                structured_output: Duration::from_secs(1),
            });
        let line = runner.command_line(&CommandRequest::new(Operation::Compile));

        assert_eq!(line.to_string(), "/opt/dbt/bin/dbt compile --project-dir /srv/project");
        assert_eq!(runner.timeouts().command, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_is_reported_as_launch_failure() {
        let runner = CommandRunner::default().with_program("dbt-runner-test-no-such-program");
        let result = runner.execute(&CommandRequest::new(Operation::Debug)).await;

        assert!(!result.succeeded);
        assert_eq!(result.exit_code, None);
        assert!(matches!(
            result.failure_reason,
            Some(crate::domain::result::FailureReason::Launch(ref detail))
                if detail.contains("dbt-runner-test-no-such-program")
        ));
        assert_eq!(result.invoked_command_line, vec!["dbt-runner-test-no-such-program", "debug"]);
    }
}
