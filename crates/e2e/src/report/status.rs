use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a step or case
///
/// `NotStarted -> Running -> {Passed, Failed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    NotStarted,
    Running,
    Passed,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotStarted => "NOT_STARTED",
            Status::Running => "RUNNING",
            Status::Passed => "PASSED",
            Status::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Passed | Status::Failed)
    }

    pub(crate) fn css_class(&self) -> &'static str {
        match self {
            Status::NotStarted => "not-started",
            Status::Running => "running",
            Status::Passed => "passed",
            Status::Failed => "failed",
        }
    }

    pub(crate) fn icon(&self) -> &'static str {
        match self {
            Status::Passed => "✓",
            Status::Failed => "✗",
            Status::NotStarted | Status::Running => "⚠",
        }
    }

    pub(crate) fn from_success(success: bool) -> Self {
        if success {
            Status::Passed
        } else {
            Status::Failed
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
