use thiserror::Error;

/// Rejected before any process is spawned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("unsupported dbt operation `{operation}` (expected {expected})")]
    UnsupportedOperation { operation: String, expected: String },
}

/// Why the `--output json` follow-up for `list` produced nothing.
///
/// These never reach the caller as errors: the runner logs them and leaves
/// `structured_output` unset.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StructuredOutputError {
    #[error("structured output invocation could not be launched: {0}")]
    Launch(String),
    #[error("structured output invocation failed while collecting output: {0}")]
    Io(String),
    #[error("structured output invocation timed out after {after_secs}s")]
    Timeout { after_secs: u64 },
    #[error("structured output invocation exited with {}", describe_exit(.exit_code))]
    NonZeroExit { exit_code: Option<i32> },
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
