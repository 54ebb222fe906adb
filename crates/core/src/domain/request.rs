use serde::{Deserialize, Serialize};

use crate::domain::operation::Operation;
use crate::errors::RequestError;

/// Structured parameters for one dbt invocation.
///
/// Optional strings that are empty or whitespace-only count as unset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub operation: Operation,
    #[serde(default)]
    pub target_models: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub excluder: Option<String>,
    #[serde(default)]
    pub full_refresh: bool,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub project_directory: Option<String>,
    #[serde(default)]
    pub profiles_directory: Option<String>,
}

/// Which node-selection flag a request resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection<'a> {
    Models(&'a str),
    Select(&'a str),
    All,
}

impl CommandRequest {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            target_models: None,
            selector: None,
            excluder: None,
            full_refresh: false,
            fail_fast: false,
            project_directory: None,
            profiles_directory: None,
        }
    }

    pub fn parse(operation: &str) -> Result<Self, RequestError> {
        Ok(Self::new(operation.parse()?))
    }

    pub fn with_models(mut self, models: impl Into<String>) -> Self {
        self.target_models = Some(models.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_excluder(mut self, excluder: impl Into<String>) -> Self {
        self.excluder = Some(excluder.into());
        self
    }

    pub fn with_full_refresh(mut self, full_refresh: bool) -> Self {
        self.full_refresh = full_refresh;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_project_directory(mut self, directory: impl Into<String>) -> Self {
        self.project_directory = Some(directory.into());
        self
    }

    pub fn with_profiles_directory(mut self, directory: impl Into<String>) -> Self {
        self.profiles_directory = Some(directory.into());
        self
    }

    /// `target_models` always wins over `selector`.
    pub fn selection(&self) -> Selection<'_> {
        if let Some(models) = present(&self.target_models) {
            return Selection::Models(models);
        }
        if let Some(selector) = present(&self.selector) {
            return Selection::Select(selector);
        }
        Selection::All
    }

    /// True when a selector was given but is ignored because models were also given.
    pub fn selector_is_shadowed(&self) -> bool {
        present(&self.target_models).is_some() && present(&self.selector).is_some()
    }

    pub fn excluder(&self) -> Option<&str> {
        present(&self.excluder)
    }

    pub fn project_directory(&self) -> Option<&str> {
        present(&self.project_directory)
    }

    pub fn profiles_directory(&self) -> Option<&str> {
        present(&self.profiles_directory)
    }
}

pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}
