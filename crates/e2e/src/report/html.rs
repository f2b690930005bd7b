//! HTML rendering of a [`RunReport`]
//!
//! Every piece of recorded text (names, descriptions, attachments, error
//! messages, traces) is escaped before it reaches the markup.

use chrono::{DateTime, Local};
use html_escape::encode_text;

use crate::clock::TIMESTAMP_FORMAT;
use crate::report::run::{format_duration, RunReport};

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 20px; }
        .header { background-color: #f0f0f0; padding: 20px; border-radius: 5px; }
        .summary { background-color: #e8f5e8; padding: 15px; border-radius: 5px; margin: 20px 0; }
        .test-case { border: 1px solid #ddd; margin: 10px 0; border-radius: 5px; }
        .test-case-header { background-color: #f9f9f9; padding: 10px; border-bottom: 1px solid #ddd; }
        .test-step { margin: 5px 10px; padding: 5px; border-left: 3px solid #ddd; }
        .passed { border-left-color: #4CAF50; }
        .failed { border-left-color: #f44336; }
        .running { border-left-color: #2196F3; }
        .not-started { border-left-color: #9E9E9E; }
        .attachment { background-color: #f5f5f5; padding: 10px; margin: 5px 0; font-family: monospace; white-space: pre-wrap; overflow-x: auto; }
        .error-details { background-color: #ffebee; padding: 10px; margin: 5px 0; border-radius: 3px; }
        .stack-trace { background-color: #f5f5f5; padding: 10px; margin: 5px 0; font-family: monospace; font-size: 12px; white-space: pre-wrap; }
        .execution-errors { background-color: #fff3cd; padding: 15px; border-radius: 5px; margin: 20px 0; }
"#;

pub(crate) fn render(report: &RunReport, generated_at: DateTime<Local>) -> String {
    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Test Execution Report</title>
    <style>{style}    </style>
</head>
<body>
    <div class="header">
        <h1>Test Execution Report</h1>
        <p>Generated on: {generated}</p>
    </div>
"#,
        style = STYLE,
        generated = generated_at.format(TIMESTAMP_FORMAT),
    ));

    let summary = report.summary();
    html.push_str(&format!(
        r#"    <div class="summary">
        <h2>Summary</h2>
        <p><strong>Total Tests:</strong> {}</p>
        <p><strong>Passed:</strong> {}</p>
        <p><strong>Failed:</strong> {}</p>
        <p><strong>Total Steps:</strong> {}</p>
        <p><strong>Passed Steps:</strong> {}</p>
        <p><strong>Failed Steps:</strong> {}</p>
        <p><strong>Duration:</strong> {} seconds</p>
        <p><strong>Execution Errors:</strong> {}</p>
    </div>
"#,
        summary.total_tests,
        summary.passed_tests,
        summary.failed_tests,
        summary.total_steps,
        summary.passed_steps,
        summary.failed_steps,
        format_duration(report.duration()),
        summary.execution_error_count,
    ));

    if !report.execution_errors().is_empty() {
        html.push_str("    <div class=\"execution-errors\">\n        <h2>Execution Errors</h2>\n");
        for error in report.execution_errors() {
            html.push_str(&format!(
                "        <div class=\"error-details\">\n            <p><strong>Time:</strong> {}</p>\n            <p><strong>Error:</strong> {}</p>\n",
                error.timestamp.format(TIMESTAMP_FORMAT),
                encode_text(&error.message),
            ));
            push_trace(&mut html, error.trace.as_deref(), "            ");
            html.push_str("        </div>\n");
        }
        html.push_str("    </div>\n");
    }

    for case in report.cases() {
        html.push_str(&format!(
            r#"    <div class="test-case {class}">
        <div class="test-case-header">
            <h3>{name}</h3>
            <p><strong>Status:</strong> {status}</p>
            <p><strong>Description:</strong> {description}</p>
            <p><strong>Duration:</strong> {duration} seconds</p>
"#,
            class = case.status().css_class(),
            name = encode_text(case.name()),
            status = case.status(),
            description = encode_text(case.description()),
            duration = format_duration(case.duration()),
        ));
        for attachment in case.attachments() {
            html.push_str(&format!(
                "            <p><strong>{}:</strong></p>\n            <div class=\"attachment\">{}</div>\n",
                encode_text(&attachment.label),
                encode_text(&attachment.content),
            ));
        }
        if let Some(message) = case.error_message() {
            html.push_str(&format!(
                "            <div class=\"error-details\">\n                <p><strong>Test Case Error:</strong> {}</p>\n",
                encode_text(message),
            ));
            push_trace(&mut html, case.trace(), "                ");
            html.push_str("            </div>\n");
        }
        html.push_str("        </div>\n");

        for step in case.steps() {
            html.push_str(&format!(
                r#"        <div class="test-step {class}">
            <p><strong>{name}</strong> - {description}</p>
            <p>Status: {status}</p>
            <p>Duration: {duration} seconds</p>
"#,
                class = step.status().css_class(),
                name = encode_text(step.name()),
                description = encode_text(step.description()),
                status = step.status(),
                duration = format_duration(step.duration()),
            ));
            if let Some(message) = step.error_message() {
                html.push_str(&format!(
                    "            <div class=\"error-details\">\n                <p><strong>Step Error:</strong> {}</p>\n",
                    encode_text(message),
                ));
                push_trace(&mut html, step.trace(), "                ");
                html.push_str("            </div>\n");
            }
            html.push_str("        </div>\n");
        }

        html.push_str("    </div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn push_trace(html: &mut String, trace: Option<&str>, indent: &str) {
    if let Some(trace) = trace {
        html.push_str(&format!(
            "{}<div class=\"stack-trace\">{}</div>\n",
            indent,
            encode_text(trace)
        ));
    }
}
