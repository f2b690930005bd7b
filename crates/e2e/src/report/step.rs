use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::clock::{system_clock, Clock};
use crate::error::{E2eError, E2eResult};
use crate::report::Status;

/// A single timed action inside a case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecorder {
    name: String,
    description: String,
    started_at: Option<DateTime<Local>>,
    finished_at: Option<DateTime<Local>>,
    status: Status,
    error_message: Option<String>,
    trace: Option<String>,
    #[serde(skip, default = "system_clock")]
    clock: Arc<dyn Clock>,
}

impl StepRecorder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_clock(name, description, system_clock())
    }

    pub fn with_clock(
        name: impl Into<String>,
        description: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            started_at: None,
            finished_at: None,
            status: Status::NotStarted,
            error_message: None,
            trace: None,
            clock,
        }
    }

    /// Record the start time and move to `Running`
    pub fn start(&mut self) -> E2eResult<()> {
        if self.status != Status::NotStarted {
            return Err(self.transition_error(Status::Running));
        }
        self.mark_started();
        Ok(())
    }

    /// Record the end time and the terminal outcome
    ///
    /// Error fields are only kept for a failing step.
    pub fn complete(
        &mut self,
        success: bool,
        error_message: Option<String>,
        trace: Option<String>,
    ) -> E2eResult<()> {
        let target = Status::from_success(success);
        if self.status.is_terminal() {
            return Err(self.transition_error(target));
        }
        self.mark_finished(success, error_message, trace);
        Ok(())
    }

    pub fn duration(&self) -> Option<Duration> {
        elapsed(self.started_at, self.finished_at)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(self.clock.now());
        self.status = Status::Running;
    }

    pub(crate) fn mark_finished(
        &mut self,
        success: bool,
        error_message: Option<String>,
        trace: Option<String>,
    ) {
        self.finished_at = Some(self.clock.now());
        self.status = Status::from_success(success);
        if success {
            self.error_message = None;
            self.trace = None;
        } else {
            self.error_message = error_message;
            self.trace = trace;
        }
    }

    fn transition_error(&self, to: Status) -> E2eError {
        E2eError::InvalidState {
            name: self.name.clone(),
            from: self.status,
            to,
        }
    }
}

/// `end - start`, or `None` when either end is missing or the clock went backwards
pub(crate) fn elapsed(
    start: Option<DateTime<Local>>,
    end: Option<DateTime<Local>>,
) -> Option<Duration> {
    match (start, end) {
        (Some(start), Some(end)) => (end - start).to_std().ok(),
        _ => None,
    }
}
