//! Scoped step acquisition

use std::fmt;

use tracing::{debug, error, warn};

use crate::report::case::CaseRecorder;
use crate::report::step::StepRecorder;

/// Guard for a running step
///
/// Completing through [`StepScope::finish`] records the outcome. A scope that
/// is dropped unfinished, including while a panic unwinds through it, marks
/// its step failed.
pub struct StepScope<'a> {
    case: &'a mut CaseRecorder,
    index: usize,
    finished: bool,
}

impl<'a> StepScope<'a> {
    pub(crate) fn new(case: &'a mut CaseRecorder, index: usize) -> Self {
        Self {
            case,
            index,
            finished: false,
        }
    }

    pub fn step(&self) -> &StepRecorder {
        &self.case.steps[self.index]
    }

    /// Record `result` on the step and return it untouched
    pub fn finish<T, E>(mut self, result: Result<T, E>) -> Result<T, E>
    where
        E: fmt::Display + fmt::Debug,
    {
        match &result {
            Ok(_) => self.close(true, None, None),
            Err(e) => {
                let message = e.to_string();
                let trace = format!("{:?}", e);
                error!("Step '{}' failed: {}", self.step().name(), message);
                debug!("Trace for '{}': {}", self.step().name(), trace);
                self.close(false, Some(message), Some(trace));
            }
        }
        result
    }

    fn close(&mut self, success: bool, error_message: Option<String>, trace: Option<String>) {
        self.finished = true;
        if let Some(step) = self.case.steps.get_mut(self.index) {
            step.mark_finished(success, error_message, trace);
        }
    }
}

impl Drop for StepScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let reason = if std::thread::panicking() {
            "step panicked"
        } else {
            "step abandoned before completion"
        };
        warn!("Step '{}': {}", self.step().name(), reason);
        self.close(false, Some(reason.to_string()), None);
    }
}
