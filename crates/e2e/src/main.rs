//! Connection check runner entry point
//!
//! Run with: cargo run --package proxy-e2e -- --suite suites/

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use proxy_e2e::clock::system_clock;
use proxy_e2e::runner::{exit_code, run_connection_checks, RunnerConfig, EXIT_SETUP_ERROR};
use proxy_e2e::{E2eResult, RunReport, SuiteConfig};

#[derive(Parser, Debug)]
#[command(name = "proxy-e2e")]
#[command(about = "Runs proxy connection checks and writes test reports")]
struct Args {
    /// Suite file, or a directory of suite files
    #[arg(short, long, env = "PROXY_E2E_SUITE", default_value = "suites")]
    suite: PathBuf,

    /// Run only the check with this key (repeatable)
    #[arg(long)]
    only: Vec<String>,

    /// Run only checks carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Root directory for timestamped report directories [default: reports]
    #[arg(short, long, env = "PROXY_E2E_REPORTS")]
    reports: Option<PathBuf>,

    /// File stem for the rendered reports [default: test_report]
    #[arg(short, long)]
    name: Option<String>,

    /// Per-snippet timeout in seconds [default: 30]
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Shell used for curl snippets [default: sh]
    #[arg(long)]
    shell: Option<String>,

    /// Interpreter used for non-curl snippets [default: python]
    #[arg(long, env = "PROXY_E2E_PYTHON")]
    python: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig {
            only: self.only.clone(),
            tag: self.tag.clone(),
            ..RunnerConfig::default()
        };
        if let Some(reports) = &self.reports {
            config.report_root = reports.clone();
        }
        if let Some(name) = &self.name {
            config.report_name = name.clone();
        }
        if let Some(shell) = &self.shell {
            config.snippets.shell = shell.clone();
        }
        if let Some(python) = &self.python {
            config.snippets.python = python.clone();
        }
        match self.timeout_secs {
            Some(secs) => config.with_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(EXIT_SETUP_ERROR);
        }
    };

    let result = rt.block_on(async_main(args));
    if let Err(e) = &result {
        eprintln!("Error: {}", e);
    }
    std::process::exit(exit_code(&result));
}

async fn async_main(args: Args) -> E2eResult<RunReport> {
    let config = args.runner_config();
    let suite = SuiteConfig::load(&args.suite)?;
    info!("Loaded suite '{}' with {} check(s)", suite.name, suite.checks.len());

    run_connection_checks(&suite, &config, system_clock()).await
}
