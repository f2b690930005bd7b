use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::{system_clock, Clock};
use crate::error::E2eResult;
use crate::report::case::CaseRecorder;
use crate::report::step::elapsed;
use crate::report::{html, text, Status};

/// A failure that belongs to no case, e.g. a preflight check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub message: String,
    pub trace: Option<String>,
    pub timestamp: DateTime<Local>,
}

/// Aggregate counts for a run, computed fresh from the recorded cases
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub total_steps: usize,
    pub passed_steps: usize,
    pub failed_steps: usize,
    pub duration_seconds: Option<f64>,
    pub execution_error_count: usize,
}

impl Summary {
    /// Percentage of passed tests, `None` for an empty run
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_tests == 0 {
            None
        } else {
            Some(self.passed_tests as f64 / self.total_tests as f64 * 100.0)
        }
    }

    /// True when every test passed and nothing failed outside the tests
    pub fn all_passed(&self) -> bool {
        self.passed_tests == self.total_tests && self.execution_error_count == 0
    }
}

/// Results of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    report_dir: PathBuf,
    cases: Vec<CaseRecorder>,
    started_at: Option<DateTime<Local>>,
    finished_at: Option<DateTime<Local>>,
    execution_errors: Vec<ExecutionError>,
    #[serde(skip, default = "system_clock")]
    clock: Arc<dyn Clock>,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    generated_at: DateTime<Local>,
    summary: Summary,
    #[serde(flatten)]
    report: &'a RunReport,
}

impl RunReport {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(report_dir, system_clock())
    }

    pub fn with_clock(report_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            report_dir: report_dir.into(),
            cases: Vec::new(),
            started_at: None,
            finished_at: None,
            execution_errors: Vec::new(),
            clock,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(self.clock.now());
    }

    pub fn complete(&mut self) {
        self.finished_at = Some(self.clock.now());
    }

    pub fn add_case(&mut self, case: CaseRecorder) {
        self.cases.push(case);
    }

    pub fn add_execution_error(&mut self, message: impl Into<String>, trace: Option<String>) {
        let message = message.into();
        warn!("Execution error: {}", message);
        self.execution_errors.push(ExecutionError {
            message,
            trace,
            timestamp: self.clock.now(),
        });
    }

    pub fn summary(&self) -> Summary {
        let count = |status: Status| self.cases.iter().filter(|c| c.status() == status).count();
        Summary {
            total_tests: self.cases.len(),
            passed_tests: count(Status::Passed),
            failed_tests: count(Status::Failed),
            total_steps: self.cases.iter().map(|c| c.steps().len()).sum(),
            passed_steps: self.cases.iter().map(|c| c.passed_step_count()).sum(),
            failed_steps: self.cases.iter().map(|c| c.failed_step_count()).sum(),
            duration_seconds: self.duration().map(|d| d.as_secs_f64()),
            execution_error_count: self.execution_errors.len(),
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        elapsed(self.started_at, self.finished_at)
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn cases(&self) -> &[CaseRecorder] {
        &self.cases
    }

    pub fn execution_errors(&self) -> &[ExecutionError] {
        &self.execution_errors
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    /// HTML document for the current state
    pub fn to_html(&self) -> String {
        html::render(self, self.clock.now())
    }

    /// Plain-text report embedding `console_output`
    pub fn to_text(&self, console_output: &str) -> String {
        text::render(self, console_output, self.clock.now())
    }

    /// Write `<report_dir>/<name>.html`
    pub fn render_html(&self, name: &str) -> E2eResult<PathBuf> {
        self.write_file(name, "html", &self.to_html())
    }

    /// Write `<report_dir>/<name>.txt`
    pub fn render_text(&self, console_output: &str, name: &str) -> E2eResult<PathBuf> {
        self.write_file(name, "txt", &self.to_text(console_output))
    }

    /// Write `<report_dir>/<name>.json` with the summary and the full case tree
    pub fn write_json(&self, name: &str) -> E2eResult<PathBuf> {
        let document = ReportDocument {
            generated_at: self.clock.now(),
            summary: self.summary(),
            report: self,
        };
        let json = serde_json::to_string_pretty(&document)?;
        self.write_file(name, "json", &json)
    }

    fn write_file(&self, name: &str, extension: &str, contents: &str) -> E2eResult<PathBuf> {
        let path = self.report_dir.join(format!("{}.{}", name, extension));
        std::fs::write(&path, contents)?;
        info!("Report written to: {}", path.display());
        Ok(path)
    }
}

/// `12.34` style seconds, or `N/A`
pub(crate) fn format_duration(duration: Option<Duration>) -> String {
    match duration {
        Some(d) => format!("{:.2}", d.as_secs_f64()),
        None => "N/A".to_string(),
    }
}
