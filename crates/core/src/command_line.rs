//! Deterministic assembly of the dbt argv.
//!
//! Token order is fixed so command lines can be compared verbatim:
//! program, operation, selection, `--exclude`, `--full-refresh`,
//! `--fail-fast`, `--project-dir`, `--profiles-dir`.

use std::fmt;

use crate::domain::request::{CommandRequest, Selection};

pub const OUTPUT_FLAG: &str = "--output";
pub const JSON_OUTPUT: &str = "json";

/// Argv for one invocation, program first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    tokens: Vec<String>,
}

/// Directories applied to requests that leave them unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryDefaults {
    pub project_dir: Option<String>,
    pub profiles_dir: Option<String>,
}

impl CommandLine {
    pub fn assemble(program: &str, request: &CommandRequest, defaults: &DirectoryDefaults) -> Self {
        let mut tokens = vec![program.to_string(), request.operation.as_str().to_string()];

        match request.selection() {
            Selection::Models(models) => push_pair(&mut tokens, "--models", models),
            Selection::Select(selector) => push_pair(&mut tokens, "--select", selector),
            Selection::All => {}
        }

        if let Some(excluder) = request.excluder() {
            push_pair(&mut tokens, "--exclude", excluder);
        }

        if request.full_refresh {
            tokens.push("--full-refresh".to_string());
        }
        if request.fail_fast {
            tokens.push("--fail-fast".to_string());
        }

        let project_dir = request.project_directory().or(defaults.project_dir.as_deref());
        if let Some(project_dir) = project_dir {
            push_pair(&mut tokens, "--project-dir", project_dir);
        }

        let profiles_dir = request.profiles_directory().or(defaults.profiles_dir.as_deref());
        if let Some(profiles_dir) = profiles_dir {
            push_pair(&mut tokens, "--profiles-dir", profiles_dir);
        }

        Self { tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|existing| existing == token)
    }

    pub fn requests_structured_output(&self) -> bool {
        self.contains(OUTPUT_FLAG)
    }

    /// Same argv with `--output json` appended.
    pub fn with_structured_output(&self) -> Self {
        let mut tokens = self.tokens.clone();
        push_pair(&mut tokens, OUTPUT_FLAG, JSON_OUTPUT);
        Self { tokens }
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

fn push_pair(tokens: &mut Vec<String>, flag: &str, value: &str) {
    tokens.push(flag.to_string());
    tokens.push(value.to_string());
}
