use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::clock::{system_clock, Clock};
use crate::error::{E2eError, E2eResult};
use crate::report::scope::StepScope;
use crate::report::step::{elapsed, StepRecorder};
use crate::report::Status;

/// One scenario: an ordered list of steps plus an overall outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecorder {
    name: String,
    description: String,
    pub(crate) steps: Vec<StepRecorder>,
    started_at: Option<DateTime<Local>>,
    finished_at: Option<DateTime<Local>>,
    status: Status,
    error_message: Option<String>,
    trace: Option<String>,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(skip, default = "system_clock")]
    clock: Arc<dyn Clock>,
}

/// Labelled text kept with a case, e.g. the command a check ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub label: String,
    pub content: String,
}

/// A failed step as listed in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedStep<'a> {
    /// Zero-based position in the case
    pub index: usize,
    pub name: &'a str,
    pub error_message: Option<&'a str>,
    pub trace: Option<&'a str>,
}

impl FailedStep<'_> {
    /// One-based position, as shown to humans
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

impl CaseRecorder {
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
            steps: Vec::new(),
            started_at: None,
            finished_at: None,
            status: Status::NotStarted,
            error_message: None,
            trace: None,
            attachments: Vec::new(),
            clock,
        }
    }

    pub fn start(&mut self) -> E2eResult<()> {
        if self.status != Status::NotStarted || self.finished_at.is_some() {
            return Err(self.transition_error(Status::Running));
        }
        self.started_at = Some(self.clock.now());
        self.status = Status::Running;
        Ok(())
    }

    /// Close the case
    ///
    /// An explicit `success` wins; `None` derives the status from the steps.
    /// Returns the final status. A case is completed at most once, whatever
    /// status it ended in.
    pub fn complete(
        &mut self,
        success: Option<bool>,
        error_message: Option<String>,
        trace: Option<String>,
    ) -> E2eResult<Status> {
        let status = match success {
            Some(success) => Status::from_success(success),
            None => self.derived_status(),
        };
        if self.finished_at.is_some() {
            return Err(self.transition_error(status));
        }

        self.finished_at = Some(self.clock.now());
        self.status = status;
        self.error_message = error_message;
        self.trace = trace;
        Ok(status)
    }

    /// Status implied by the steps alone
    ///
    /// Any failed step wins, even while other steps are incomplete.
    pub fn derived_status(&self) -> Status {
        if self.steps.is_empty() {
            return Status::NotStarted;
        }
        if self.steps.iter().any(|s| s.status() == Status::Failed) {
            return Status::Failed;
        }
        if self.steps.iter().all(|s| s.status() == Status::Passed) {
            return Status::Passed;
        }
        Status::Running
    }

    pub fn add_step(&mut self, step: StepRecorder) {
        self.steps.push(step);
    }

    /// Append a started step and hand back a guard that completes it
    pub fn begin_step(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> StepScope<'_> {
        let mut step = StepRecorder::with_clock(name, description, self.clock.clone());
        step.mark_started();
        self.steps.push(step);
        let index = self.steps.len() - 1;
        StepScope::new(self, index)
    }

    /// Run `work` as one tracked step
    ///
    /// The step is completed on every exit path; an error is recorded and
    /// returned to the caller unchanged.
    pub fn track<T, E, F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: fmt::Display + fmt::Debug,
    {
        let scope = self.begin_step(name, description);
        let result = work();
        scope.finish(result)
    }

    /// Keep `content` under `label`; attachments render in recorded order
    pub fn attach(&mut self, label: impl Into<String>, content: impl Into<String>) {
        self.attachments.push(Attachment {
            label: label.into(),
            content: content.into(),
        });
    }

    pub fn passed_step_count(&self) -> usize {
        self.count_steps(Status::Passed)
    }

    pub fn failed_step_count(&self) -> usize {
        self.count_steps(Status::Failed)
    }

    /// Failed steps in execution order, recomputed on each call
    pub fn failed_step_details(&self) -> impl Iterator<Item = FailedStep<'_>> + '_ {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.status() == Status::Failed)
            .map(|(index, step)| FailedStep {
                index,
                name: step.name(),
                error_message: step.error_message(),
                trace: step.trace(),
            })
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

    pub fn steps(&self) -> &[StepRecorder] {
        &self.steps
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

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    fn count_steps(&self, status: Status) -> usize {
        self.steps.iter().filter(|s| s.status() == status).count()
    }

    fn transition_error(&self, to: Status) -> E2eError {
        E2eError::InvalidState {
            name: self.name.clone(),
            from: self.status,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_with(status: Status) -> StepRecorder {
        let mut step = StepRecorder::new(format!("{}-step", status), "");
        match status {
            Status::NotStarted => {}
            Status::Running => step.start().unwrap(),
            Status::Passed => {
                step.start().unwrap();
                step.complete(true, None, None).unwrap();
            }
            Status::Failed => {
                step.start().unwrap();
                step.complete(false, Some("boom".into()), None).unwrap();
            }
        }
        step
    }

    fn case_with(statuses: &[Status]) -> CaseRecorder {
        let mut case = CaseRecorder::new("case", "");
        case.start().unwrap();
        for status in statuses {
            case.add_step(step_with(*status));
        }
        case
    }

    #[test]
    fn test_all_passed_derives_passed() {
        let mut case = case_with(&[Status::Passed, Status::Passed, Status::Passed]);
        assert_eq!(case.complete(None, None, None).unwrap(), Status::Passed);
        assert_eq!(case.status(), Status::Passed);
    }

    #[test]
    fn test_failed_dominates_incomplete_steps() {
        let mut case = case_with(&[Status::Passed, Status::Failed, Status::NotStarted]);
        assert_eq!(case.complete(None, None, None).unwrap(), Status::Failed);
    }

    #[test]
    fn test_no_steps_derives_not_started() {
        let mut case = case_with(&[]);
        assert_eq!(case.complete(None, None, None).unwrap(), Status::NotStarted);
    }

    #[test]
    fn test_incomplete_steps_derive_running() {
        let case = case_with(&[Status::Passed, Status::Running]);
        assert_eq!(case.derived_status(), Status::Running);
    }

    #[test]
    fn test_explicit_success_overrides_steps() {
        let mut case = case_with(&[Status::Failed]);
        let status = case.complete(Some(true), None, None).unwrap();
        assert_eq!(status, Status::Passed);

        let mut case = case_with(&[Status::Passed]);
        let status = case
            .complete(Some(false), Some("balance too low".into()), None)
            .unwrap();
        assert_eq!(status, Status::Failed);
        assert_eq!(case.error_message(), Some("balance too low"));
    }

    #[test]
    fn test_complete_twice_is_rejected() {
        let mut case = case_with(&[Status::Passed]);
        case.complete(None, None, None).unwrap();
        assert!(case.complete(Some(false), None, None).is_err());
        assert_eq!(case.status(), Status::Passed);
    }

    #[test]
    fn test_complete_twice_with_incomplete_steps_is_rejected() {
        let mut case = case_with(&[Status::Passed, Status::Running]);
        let status = case.complete(None, Some("first".into()), None).unwrap();
        assert_eq!(status, Status::Running);
        let finished = case.finished_at();

        let err = case.complete(None, Some("second".into()), None).unwrap_err();
        assert!(matches!(err, E2eError::InvalidState { from: Status::Running, .. }));
        assert_eq!(case.finished_at(), finished);
        assert_eq!(case.error_message(), Some("first"));
    }

    #[test]
    fn test_completed_case_without_steps_cannot_restart() {
        let mut case = case_with(&[]);
        let started = case.started_at();
        assert_eq!(case.complete(None, None, None).unwrap(), Status::NotStarted);

        assert!(case.complete(None, None, None).is_err());
        assert!(matches!(
            case.start().unwrap_err(),
            E2eError::InvalidState { from: Status::NotStarted, to: Status::Running, .. }
        ));
        assert_eq!(case.started_at(), started);
    }

    #[test]
    fn test_attachments_keep_order() {
        let mut case = CaseRecorder::new("datacenter", "");
        case.attach("Command", "curl -x proxy:8000 https://ipinfo.io");
        case.attach("Output", "{}");

        let attachments = case.attachments();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].label, "Command");
        assert_eq!(attachments[1].label, "Output");
        assert_eq!(attachments[1].content, "{}");
    }

    #[test]
    fn test_step_counts_and_failed_details() {
        let case = case_with(&[Status::Failed, Status::Passed, Status::Failed]);
        assert_eq!(case.passed_step_count(), 1);
        assert_eq!(case.failed_step_count(), 2);

        let numbers: Vec<usize> = case.failed_step_details().map(|d| d.number()).collect();
        assert_eq!(numbers, vec![1, 3]);

        // Restartable: a second walk sees the same records.
        assert_eq!(case.failed_step_details().count(), 2);
        let first = case.failed_step_details().next().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.error_message, Some("boom"));
    }

    #[test]
    fn test_steps_may_share_names() {
        let mut case = CaseRecorder::new("dup", "");
        case.add_step(StepRecorder::new("click", ""));
        case.add_step(StepRecorder::new("click", ""));
        assert_eq!(case.steps().len(), 2);
    }
}
