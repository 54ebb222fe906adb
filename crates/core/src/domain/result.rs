use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an invocation produced no exit code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Timeout { after_secs: u64 },
    Launch(String),
    Io(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { .. } => f.write_str("timeout"),
            Self::Launch(detail) => write!(f, "failed to launch command: {detail}"),
            Self::Io(detail) => write!(f, "failed to collect command output: {detail}"),
        }
    }
}

/// Outcome of one `CommandRunner::execute` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub invocation_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub invoked_command_line: Vec<String>,
    pub exit_code: Option<i32>,
    pub standard_output: String,
    pub standard_error: String,
    pub succeeded: bool,
    pub structured_output: Option<String>,
    pub failure_reason: Option<FailureReason>,
}

/// Caller-facing JSON shape of a result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReport {
    pub command: String,
    pub return_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn command_string(&self) -> String {
        self.invoked_command_line.join(" ")
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.failure_reason, Some(FailureReason::Timeout { .. }))
    }

    pub fn report(&self) -> CommandReport {
        CommandReport {
            command: self.command_string(),
            return_code: self.exit_code,
            stdout: self.standard_output.clone(),
            stderr: self.standard_error.clone(),
            success: self.succeeded,
            json_output: self.structured_output.clone(),
            error: self.failure_reason.as_ref().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{CommandResult, FailureReason};

    fn result(failure_reason: Option<FailureReason>) -> CommandResult {
        CommandResult {
            invocation_id: Uuid::new_v4(),
            started_at: Utc::now(),
            elapsed_ms: 12,
            invoked_command_line: vec!["dbt".to_string(), "list".to_string()],
            exit_code: failure_reason.is_none().then_some(0),
            standard_output: "orders\ncustomers\n".to_string(),
            standard_error: String::new(),
            succeeded: failure_reason.is_none(),
            structured_output: None,
            failure_reason,
        }
    }

    #[test]
    fn timeout_reason_displays_as_bare_timeout() {
        assert_eq!(FailureReason::Timeout { after_secs: 300 }.to_string(), "timeout");
    }

    #[test]
    fn report_joins_tokens_and_omits_absent_fields() {
        let report = result(None).report();
        assert_eq!(report.command, "dbt list");

        let json = serde_json::to_value(&report).expect("report serializes");
        assert_eq!(json["return_code"], 0);
        assert_eq!(json["success"], true);
        assert!(json.get("json_output").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn report_carries_failure_reason_as_error_text() {
        let failed = result(Some(FailureReason::Timeout { after_secs: 300 }));
        assert!(failed.timed_out());

        let json = serde_json::to_value(failed.report()).expect("report serializes");
        assert_eq!(json["error"], "timeout");
        assert_eq!(json["success"], false);
        assert!(json["return_code"].is_null());
    }
}
