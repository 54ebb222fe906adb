use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::operation::Operation;
use crate::domain::request::CommandRequest;
use crate::domain::result::CommandResult;
use crate::runner::CommandRunner;

/// Outcome of `dbt debug` followed by `dbt list --select *`.
#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub program_path: Option<PathBuf>,
    pub debug: CommandResult,
    pub model_list: CommandResult,
    pub message: String,
}

/// Resolves `program` against `PATH` (or checks it directly when it is a path).
pub fn locate_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

impl CommandRunner {
    pub async fn health_check(&self) -> HealthReport {
        let program_path = locate_program(self.program());
        if program_path.is_none() {
            warn!(
                event_name = "runner.health.program_missing",
                program = self.program(),
                "dbt program not found on PATH"
            );
        }

        let debug_result = self.execute(&CommandRequest::new(Operation::Debug)).await;
        let list_request = CommandRequest::new(Operation::List).with_selector("*");
        let model_list = self.execute(&list_request).await;

        let healthy = debug_result.succeeded && model_list.succeeded;
        let message = if healthy {
            "dbt project appears to be configured correctly".to_string()
        } else if program_path.is_none() {
            format!("`{}` was not found; install dbt or set dbt.program", self.program())
        } else if !debug_result.succeeded {
            "dbt debug failed; check the connection profile and project directory".to_string()
        } else {
            "dbt list failed; the project could not be parsed".to_string()
        };

        info!(
            event_name = "runner.health.completed",
            healthy,
            debug_succeeded = debug_result.succeeded,
            list_succeeded = model_list.succeeded,
            "dbt health check finished"
        );

        HealthReport { healthy, program_path, debug: debug_result, model_list, message }
    }
}
