//! Runs connection checks and records them into a [`RunReport`]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::artifacts::create_report_dir;
use crate::clock::{system_clock, Clock};
use crate::config::{ProxyCheck, SuiteConfig};
use crate::connection::{
    prepare_command, verify_response, SnippetConfig, SnippetKind, SnippetRunner,
};
use crate::error::E2eResult;
use crate::report::{CaseRecorder, RunReport, Status};

/// Exit status for a run that could not be set up or reported
pub const EXIT_SETUP_ERROR: i32 = 2;

/// Outcome of one check, with the command and output for the console transcript
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub key: String,
    pub name: String,
    pub status: Status,
    pub command: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl CheckOutcome {
    fn pending(check: &ProxyCheck) -> Self {
        Self {
            key: check.key.clone(),
            name: check.name.clone(),
            status: Status::NotStarted,
            command: None,
            output: None,
            error: None,
        }
    }

    /// Transcript block for the text report
    pub fn transcript(&self) -> String {
        let mut lines = vec![format!("{}: {}", self.name, self.status)];
        if let Some(command) = &self.command {
            lines.push(format!("  Command: {}", command));
        }
        if let Some(output) = &self.output {
            lines.push(format!("  Output: {}", output.trim_end()));
        }
        if let Some(error) = &self.error {
            lines.push(format!("  Error: {}", error));
        }
        lines.join("\n")
    }
}

/// Main connection-check runner
pub struct ConnectionRunner {
    snippets: SnippetRunner,
    clock: Arc<dyn Clock>,
}

impl ConnectionRunner {
    pub fn new(snippets: SnippetConfig) -> Self {
        Self::with_clock(snippets, system_clock())
    }

    pub fn with_clock(snippets: SnippetConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            snippets: SnippetRunner::new(snippets),
            clock,
        }
    }

    /// Checks that must hold before any case runs
    pub async fn preflight(&self) -> E2eResult<()> {
        self.snippets.check_shell().await
    }

    /// Run one check as a case of three tracked steps
    ///
    /// The case stops at its first failed step. The prepared command and the
    /// snippet response are attached to the case.
    pub async fn run_check(&self, check: &ProxyCheck) -> E2eResult<(CaseRecorder, CheckOutcome)> {
        let mut case =
            CaseRecorder::with_clock(&check.key, check.description(), self.clock.clone());
        let mut outcome = CheckOutcome::pending(check);
        case.start()?;

        let result = self.drive(&mut case, check, &mut outcome).await;
        if let Err(e) = result {
            outcome.error = Some(e.to_string());
        }
        outcome.status = case.complete(None, None, None)?;

        match outcome.status {
            Status::Passed => info!("✓ {} ({})", check.name, check.key),
            _ => error!(
                "✗ {} - {}",
                check.name,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
        }
        Ok((case, outcome))
    }

    async fn drive(
        &self,
        case: &mut CaseRecorder,
        check: &ProxyCheck,
        outcome: &mut CheckOutcome,
    ) -> E2eResult<String> {
        let command = case.track(
            "Prepare Command",
            "Prepare the copied sample code for execution",
            || prepare_command(&check.snippet, check.add_verbose_flag),
        )?;
        case.attach("Command", command.as_str());
        outcome.command = Some(command.clone());

        let scope = case.begin_step(
            "Execute Snippet",
            format!("Run the {} snippet", SnippetKind::detect(&command)),
        );
        let output = scope.finish(self.snippets.execute(&command).await)?;
        let response = output.response().to_string();
        case.attach("Output", response.as_str());
        outcome.output = Some(response.clone());

        let detail = case.track(
            "Verify Response",
            format!("Verify {} in the response", check.verification),
            || verify_response(&response, check.verification),
        )?;
        debug!("{}: {}", check.key, detail);
        Ok(detail)
    }

    /// Run `checks` in order, appending every case to `report`
    pub async fn run_suite(
        &self,
        checks: &[&ProxyCheck],
        report: &mut RunReport,
    ) -> Vec<CheckOutcome> {
        info!("Running {} check(s)...", checks.len());
        let mut outcomes = Vec::with_capacity(checks.len());

        for check in checks {
            match self.run_check(check).await {
                Ok((case, outcome)) => {
                    report.add_case(case);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    report.add_execution_error(
                        format!("Check '{}' could not be recorded: {}", check.key, e),
                        Some(format!("{:?}", e)),
                    );
                }
            }
        }

        let summary = report.summary();
        info!(
            "Check Results: {} passed, {} failed of {}",
            summary.passed_tests, summary.failed_tests, summary.total_tests
        );
        outcomes
    }
}

/// Configuration for a connection-check run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root under which the timestamped report directory is created
    pub report_root: PathBuf,

    /// File stem for the rendered reports
    pub report_name: String,

    /// Run only these check keys; empty runs every check
    pub only: Vec<String>,

    /// Run only checks carrying this tag
    pub tag: Option<String>,

    pub snippets: SnippetConfig,
}

impl RunnerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.snippets.timeout = timeout;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            report_root: PathBuf::from("reports"),
            report_name: "test_report".to_string(),
            only: Vec::new(),
            tag: None,
            snippets: SnippetConfig::default(),
        }
    }
}

/// Run the selected checks of `suite` and write HTML, text and JSON reports
///
/// Failed checks, unknown `only` keys and a failed preflight end up in the
/// returned report. An `Err` means the run could not be set up or reported.
pub async fn run_connection_checks(
    suite: &SuiteConfig,
    config: &RunnerConfig,
    clock: Arc<dyn Clock>,
) -> E2eResult<RunReport> {
    let report_dir = create_report_dir(&config.report_root, &suite.name, clock.now())?;
    let mut report = RunReport::with_clock(&report_dir, clock.clone());
    let runner = ConnectionRunner::with_clock(config.snippets.clone(), clock);

    report.start();

    let selection = suite.select(&config.only, config.tag.as_deref());
    for key in &selection.unknown_keys {
        report.add_execution_error(format!("Unknown check key: {}", key), None);
    }

    let outcomes = match runner.preflight().await {
        Ok(()) => runner.run_suite(&selection.checks, &mut report).await,
        Err(e) => {
            error!("Preflight failed, skipping all checks: {}", e);
            report.add_execution_error(
                format!("Preflight failed: {}", e),
                Some(format!("{:?}", e)),
            );
            Vec::new()
        }
    };

    report.complete();

    let transcript = outcomes
        .iter()
        .map(|o| o.transcript())
        .collect::<Vec<_>>()
        .join("\n\n");
    report.render_html(&config.report_name)?;
    report.render_text(&transcript, &config.report_name)?;
    report.write_json(&config.report_name)?;

    let summary = report.summary();
    info!(
        "Total: {}, Passed: {}, Failed: {}, Execution errors: {}",
        summary.total_tests,
        summary.passed_tests,
        summary.failed_tests,
        summary.execution_error_count
    );
    if let Some(rate) = summary.success_rate() {
        info!("Success Rate: {:.1}%", rate);
    }

    Ok(report)
}

/// Process exit status for a finished run
///
/// 0 when every case passed with no execution errors, 1 otherwise, and
/// [`EXIT_SETUP_ERROR`] when the run itself failed.
pub fn exit_code(result: &E2eResult<RunReport>) -> i32 {
    match result {
        Ok(report) if report.summary().all_passed() => 0,
        Ok(_) => 1,
        Err(_) => EXIT_SETUP_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::VerificationKind;

    fn check(key: &str, snippet: &str, verification: VerificationKind) -> ProxyCheck {
        ProxyCheck {
            key: key.to_string(),
            name: format!("{} proxies", key),
            url: String::new(),
            verification,
            premium_tab_required: false,
            add_verbose_flag: false,
            tags: vec![],
            snippet: snippet.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_snippet_stops_at_first_step() {
        let runner = ConnectionRunner::new(SnippetConfig::default());
        let (case, outcome) = runner
            .run_check(&check("isp", "   ", VerificationKind::Country))
            .await
            .unwrap();

        assert_eq!(case.status(), Status::Failed);
        assert_eq!(case.steps().len(), 1);
        assert_eq!(case.steps()[0].name(), "Prepare Command");
        assert_eq!(outcome.status, Status::Failed);
        assert!(outcome.command.is_none());
        assert!(case.attachments().is_empty());
        assert_eq!(outcome.error.as_deref(), Some("Snippet error: No code found in snippet"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_passing_check_records_three_steps() {
        let runner = ConnectionRunner::new(SnippetConfig {
            python: "cat".to_string(),
            ..Default::default()
        });
        let snippet = "{\"country\": \"US\"}";
        let (case, outcome) = runner
            .run_check(&check("datacenter", snippet, VerificationKind::Country))
            .await
            .unwrap();

        let names: Vec<&str> = case.steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Prepare Command", "Execute Snippet", "Verify Response"]);
        assert_eq!(case.status(), Status::Passed);
        assert_eq!(outcome.output.as_deref(), Some("{\"country\": \"US\"}"));
        assert!(outcome.transcript().starts_with("datacenter proxies: PASSED\n  Command: "));

        let attachments = case.attachments();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].label, "Command");
        assert_eq!(attachments[1].label, "Output");
        assert_eq!(attachments[1].content, snippet);
    }

    #[test]
    fn test_transcript_lists_error() {
        let outcome = CheckOutcome {
            key: "static".into(),
            name: "Static Residential Proxies".into(),
            status: Status::Failed,
            command: Some("curl -v".into()),
            output: None,
            error: Some("Verification failed: 'CONNECT' not found in response".into()),
        };
        assert_eq!(
            outcome.transcript(),
            "Static Residential Proxies: FAILED\n  Command: curl -v\n  Error: Verification failed: 'CONNECT' not found in response"
        );
    }
}
