//! Executing copied proxy sample code and judging its response

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

/// What a successful proxy response must contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    /// A JSON object with a `country` field (geo lookup through the proxy)
    Country,
    /// The word CONNECT anywhere in the output (tunnel handshake seen)
    Connect,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationKind::Country => "country",
            VerificationKind::Connect => "connect",
        }
    }
}

impl fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetKind {
    Curl,
    Python,
}

impl SnippetKind {
    pub fn detect(code: &str) -> Self {
        if code.trim_start().starts_with("curl") {
            SnippetKind::Curl
        } else {
            SnippetKind::Python
        }
    }
}

impl fmt::Display for SnippetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnippetKind::Curl => f.write_str("curl"),
            SnippetKind::Python => f.write_str("python"),
        }
    }
}

/// Turn a copied snippet into the command to run
pub fn prepare_command(snippet: &str, add_verbose_flag: bool) -> E2eResult<String> {
    let command = snippet.trim();
    if command.is_empty() {
        return Err(E2eError::Snippet("No code found in snippet".to_string()));
    }
    if add_verbose_flag && SnippetKind::detect(command) == SnippetKind::Curl {
        debug!("Adding -v flag to curl command");
        return Ok(format!("{} -v", command));
    }
    Ok(command.to_string())
}

/// Captured result of a snippet process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SnippetOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout on success, stderr otherwise
    ///
    /// curl reports a refused CONNECT tunnel on stderr with a non-zero exit.
    pub fn response(&self) -> &str {
        if self.success() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Configuration for running snippets
#[derive(Debug, Clone)]
pub struct SnippetConfig {
    /// Shell used for curl commands
    pub shell: String,

    /// Interpreter used for anything that is not curl
    pub python: String,

    /// Upper bound for one snippet run
    pub timeout: Duration,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            python: "python".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct SnippetRunner {
    config: SnippetConfig,
}

impl SnippetRunner {
    pub fn new(config: SnippetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnippetConfig {
        &self.config
    }

    /// Confirm the shell can be spawned at all
    pub async fn check_shell(&self) -> E2eResult<()> {
        let status = TokioCommand::new(&self.config.shell)
            .args(["-c", "true"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| spawn_error(&self.config.shell, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(E2eError::Execution(format!(
                "{} exited with {}",
                self.config.shell, status
            )))
        }
    }

    /// Run a prepared command and capture its output
    pub async fn execute(&self, command: &str) -> E2eResult<SnippetOutput> {
        let kind = SnippetKind::detect(command);

        // Owns the temporary script until the process has finished.
        let mut _script_dir = None;

        let (program, mut cmd) = match kind {
            SnippetKind::Curl => {
                info!("Executing curl command directly");
                let mut cmd = TokioCommand::new(&self.config.shell);
                cmd.arg("-c").arg(command);
                (&self.config.shell, cmd)
            }
            SnippetKind::Python => {
                let dir = tempfile::tempdir()?;
                let script_path = dir.path().join("proxy_check.py");
                std::fs::write(&script_path, command)?;
                info!("Executing snippet as Python: {}", script_path.display());

                let mut cmd = TokioCommand::new(&self.config.python);
                cmd.arg(&script_path).current_dir(dir.path());
                _script_dir = Some(dir);
                (&self.config.python, cmd)
            }
        };
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.config.timeout, cmd.output())
            .await
            .map_err(|_| {
                E2eError::Timeout(format!(
                    "{} snippet after {}s",
                    kind,
                    self.config.timeout.as_secs()
                ))
            })?
            .map_err(|e| spawn_error(program, e))?;

        let result = SnippetOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!(
            "Snippet exited with {:?} ({} bytes stdout, {} bytes stderr)",
            result.exit_code,
            result.stdout.len(),
            result.stderr.len()
        );
        Ok(result)
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> E2eError {
    E2eError::Execution(format!("Failed to spawn {}: {}", program, e))
}

/// Judge a snippet response; returns a short description of what matched
pub fn verify_response(response: &str, kind: VerificationKind) -> E2eResult<String> {
    match kind {
        VerificationKind::Country => {
            let (start, end) = match (response.find('{'), response.rfind('}')) {
                (Some(start), Some(end)) if start < end => (start, end),
                _ => {
                    return Err(E2eError::Verification(
                        "No valid JSON found in response".to_string(),
                    ))
                }
            };
            let data: serde_json::Value = serde_json::from_str(&response[start..=end])
                .map_err(|e| E2eError::Verification(format!("Failed to parse JSON: {}", e)))?;

            match data.get("country") {
                Some(serde_json::Value::String(country)) => {
                    Ok(format!("Country '{}' found in response", country))
                }
                Some(other) => Ok(format!("Country '{}' found in response", other)),
                None => Err(E2eError::Verification(
                    "No 'country' field found in response".to_string(),
                )),
            }
        }
        VerificationKind::Connect => {
            if response.to_uppercase().contains("CONNECT") {
                Ok("'CONNECT' found in response".to_string())
            } else {
                Err(E2eError::Verification(
                    "'CONNECT' not found in response".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("curl -x http://gate:1000 https://ipinfo.io", SnippetKind::Curl; "curl")]
    #[test_case("  curl https://ipinfo.io", SnippetKind::Curl; "indented curl")]
    #[test_case("import requests\nprint(requests.get('https://ipinfo.io').text)", SnippetKind::Python; "python")]
    fn test_detect_snippet_kind(code: &str, expected: SnippetKind) {
        assert_eq!(SnippetKind::detect(code), expected);
    }

    #[test]
    fn test_prepare_command_adds_verbose_only_to_curl() {
        assert_eq!(
            prepare_command(" curl https://ipinfo.io \n", true).unwrap(),
            "curl https://ipinfo.io -v"
        );
        assert_eq!(
            prepare_command("curl https://ipinfo.io", false).unwrap(),
            "curl https://ipinfo.io"
        );
        assert_eq!(
            prepare_command("print('hi')", true).unwrap(),
            "print('hi')"
        );
    }

    #[test]
    fn test_prepare_command_rejects_empty_snippet() {
        assert!(matches!(
            prepare_command("  \n", false),
            Err(E2eError::Snippet(_))
        ));
    }

    #[test_case("{\"ip\":\"1.2.3.4\",\"country\":\"US\"}", true; "plain json")]
    #[test_case("  % Total\n{\"country\": \"DE\", \"city\": \"Berlin\"}\n", true; "json after curl noise")]
    #[test_case("{\"ip\":\"1.2.3.4\"}", false; "json without country")]
    #[test_case("curl: (7) Failed to connect", false; "no json")]
    #[test_case("} reversed {", false; "braces out of order")]
    #[test_case("{not json}", false; "malformed json")]
    fn test_verify_country(response: &str, passes: bool) {
        assert_eq!(
            verify_response(response, VerificationKind::Country).is_ok(),
            passes
        );
    }

    #[test_case("* CONNECT tunnel failed, response 407", true; "tunnel failed still counts")]
    #[test_case("> connect ipinfo.io:443 HTTP/1.1", true; "case insensitive")]
    #[test_case("curl: (6) Could not resolve host", false; "no connect")]
    fn test_verify_connect(response: &str, passes: bool) {
        assert_eq!(
            verify_response(response, VerificationKind::Connect).is_ok(),
            passes
        );
    }

    #[test]
    fn test_country_detail_names_country() {
        let detail = verify_response("{\"country\":\"JP\"}", VerificationKind::Country).unwrap();
        assert_eq!(detail, "Country 'JP' found in response");
    }

    #[test]
    fn test_response_prefers_stderr_on_failure() {
        let output = SnippetOutput {
            exit_code: Some(56),
            stdout: String::new(),
            stderr: "CONNECT tunnel failed".to_string(),
        };
        assert!(!output.success());
        assert_eq!(output.response(), "CONNECT tunnel failed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_times_out() {
        let runner = SnippetRunner::new(SnippetConfig {
            timeout: Duration::from_millis(200),
            ..Default::default()
        });
        let result = runner.execute("curl_missing_binary; sleep 5").await;
        assert!(matches!(result, Err(E2eError::Timeout(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_curl_snippet_runs_from_script_file() {
        // `cat` stands in for the interpreter and echoes the script back.
        let runner = SnippetRunner::new(SnippetConfig {
            python: "cat".to_string(),
            ..Default::default()
        });
        let output = runner.execute("{\"country\": \"US\"}").await.unwrap();
        assert!(output.success());
        assert!(verify_response(output.response(), VerificationKind::Country).is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_interpreter_is_execution_error() {
        let runner = SnippetRunner::new(SnippetConfig {
            python: "definitely-not-a-python-binary".to_string(),
            ..Default::default()
        });
        let result = runner.execute("print('hi')").await;
        assert!(matches!(result, Err(E2eError::Execution(_))));
    }
}
