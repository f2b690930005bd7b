//! Proxy storefront E2E result recording and connection checks
//!
//! This crate provides the Rust side of the storefront's end-to-end suite:
//! - Records scenario outcomes as a step / case / run tree
//! - Renders run reports as HTML, plain text and JSON
//! - Executes the sample code copied from the proxy dashboard
//! - Verifies proxy responses (country lookup or CONNECT tunnel)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Connection Check Runner                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ConnectionRunner                                           │
//! │    ├── preflight() -> shell available                       │
//! │    ├── run_check(ProxyCheck) -> CaseRecorder                │
//! │    │     ├── Prepare Command                                │
//! │    │     ├── Execute Snippet                                │
//! │    │     └── Verify Response                                │
//! │    └── run_suite(checks, &mut RunReport)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RunReport                                                  │
//! │    ├── cases: [CaseRecorder]                                │
//! │    │     └── steps: [StepRecorder]                          │
//! │    ├── execution_errors                                     │
//! │    └── render_html / render_text / write_json               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod report;
pub mod runner;

pub use config::{ProxyCheck, SuiteConfig};
pub use error::{E2eError, E2eResult};
pub use report::{CaseRecorder, RunReport, Status, StepRecorder, Summary};
pub use runner::ConnectionRunner;
