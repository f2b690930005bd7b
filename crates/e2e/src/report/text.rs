//! Plain-text rendering of a [`RunReport`]

use chrono::{DateTime, Local};

use crate::clock::TIMESTAMP_FORMAT;
use crate::report::run::RunReport;
use crate::report::Status;

const RULE: &str = "============================================================";

pub(crate) fn render(
    report: &RunReport,
    console_output: &str,
    generated_at: DateTime<Local>,
) -> String {
    let mut text = String::new();

    text.push_str(&format!(
        "Test Execution Report\nGenerated on: {}\n\n{}\n\n{}\nFINAL TEST SUMMARY\n{}\n",
        generated_at.format(TIMESTAMP_FORMAT),
        console_output,
        RULE,
        RULE,
    ));

    for case in report.cases() {
        text.push_str(&format!(
            "{} {}: {}\n",
            case.status().icon(),
            case.name(),
            case.status()
        ));
        if case.status() != Status::Failed {
            continue;
        }
        if let Some(message) = case.error_message() {
            text.push_str(&format!("   Error: {}\n", message));
        }
        let mut failed = case.failed_step_details().peekable();
        if failed.peek().is_some() {
            text.push_str("   Failed Steps:\n");
            for detail in failed {
                text.push_str(&format!("     Step {}: {}\n", detail.number(), detail.name));
                if let Some(message) = detail.error_message {
                    text.push_str(&format!("       Error: {}\n", message));
                }
            }
        }
    }

    if !report.execution_errors().is_empty() {
        text.push_str("\nExecution Errors:\n");
        for error in report.execution_errors() {
            text.push_str(&format!(
                "  {}: {}\n",
                error.timestamp.format(TIMESTAMP_FORMAT),
                error.message
            ));
        }
    }

    let summary = report.summary();
    text.push_str(&format!(
        "\nOverall Results:\n  Passed: {}\n  Failed: {}\n  Total: {}\n  Steps: {} passed, {} failed of {}\n\nTest reports saved in: {}\n",
        summary.passed_tests,
        summary.failed_tests,
        summary.total_tests,
        summary.passed_steps,
        summary.failed_steps,
        summary.total_steps,
        report.report_dir().display(),
    ));

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CaseRecorder, StepRecorder};
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_failed_case_lists_failed_steps() {
        let mut case = CaseRecorder::new("paypal_checkout", "");
        case.start().unwrap();
        let _ = case.track("Open Checkout", "", || Ok::<_, String>(()));
        let _ = case.track("Click Continue", "", || Err::<(), _>("button not found".to_string()));
        case.complete(None, Some("payment not confirmed".into()), None).unwrap();

        let mut report = RunReport::new("reports/run_1");
        report.add_case(case);
        let text = render(&report, "console line", at());

        assert!(text.starts_with(
            "Test Execution Report\nGenerated on: 2024-05-01 09:00:00\n\nconsole line\n"
        ));
        assert!(text.contains("✗ paypal_checkout: FAILED\n"));
        assert!(text.contains("   Error: payment not confirmed\n"));
        assert!(text.contains(
            "   Failed Steps:\n     Step 2: Click Continue\n       Error: button not found\n"
        ));
        assert!(text.contains("  Passed: 0\n  Failed: 1\n  Total: 1\n"));
        assert!(text.contains("Test reports saved in: reports/run_1"));
        assert!(!text.contains("Execution Errors:"));
    }

    #[test]
    fn test_incomplete_case_gets_warning_icon() {
        let mut case = CaseRecorder::new("admin_provisioning", "");
        case.add_step(StepRecorder::new("select package", ""));

        let mut report = RunReport::new("reports");
        report.add_case(case);
        report.add_execution_error("browser session lost", None);
        let text = render(&report, "", at());

        assert!(text.contains("⚠ admin_provisioning: NOT_STARTED\n"));
        assert!(text.contains("\nExecution Errors:\n  2"));
        assert!(text.contains(": browser session lost\n"));
    }
}
