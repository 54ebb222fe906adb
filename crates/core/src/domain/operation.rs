use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::RequestError;

/// dbt subcommands the runner is allowed to launch.
///
/// Deserialization goes through `FromStr`, so JSON accepts the same
/// spellings as the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Operation {
    Run,
    Test,
    List,
    Compile,
    Deps,
    Snapshot,
    Seed,
    Clean,
    Debug,
    Docs,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Self::Run,
        Self::Test,
        Self::List,
        Self::Compile,
        Self::Deps,
        Self::Snapshot,
        Self::Seed,
        Self::Clean,
        Self::Debug,
        Self::Docs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Test => "test",
            Self::List => "list",
            Self::Compile => "compile",
            Self::Deps => "deps",
            Self::Snapshot => "snapshot",
            Self::Seed => "seed",
            Self::Clean => "clean",
            Self::Debug => "debug",
            Self::Docs => "docs",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Run => "execute models",
            Self::Test => "run data tests",
            Self::List => "list project resources",
            Self::Compile => "compile models without executing them",
            Self::Deps => "install package dependencies",
            Self::Snapshot => "run snapshots",
            Self::Seed => "load seed data",
            Self::Clean => "delete build artifacts",
            Self::Debug => "check connection and project configuration",
            Self::Docs => "generate or serve documentation",
        }
    }

    /// Only `list` gets a second invocation for JSON output.
    pub fn has_structured_output(&self) -> bool {
        matches!(self, Self::List)
    }

    fn expected() -> String {
        Self::ALL.iter().map(Operation::as_str).collect::<Vec<_>>().join("|")
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = RequestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|operation| operation.as_str() == normalized).ok_or_else(|| {
            RequestError::UnsupportedOperation {
                operation: value.trim().to_string(),
                expected: Self::expected(),
            }
        })
    }
}

impl TryFrom<String> for Operation {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
