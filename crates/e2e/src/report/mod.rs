//! Step, case and run result recording
//!
//! Outcomes flow bottom-up: a [`StepRecorder`] holds one timed action, a
//! [`CaseRecorder`] derives its status from its steps, and a [`RunReport`]
//! sums its cases and renders HTML, text and JSON reports.

mod case;
mod html;
mod run;
mod scope;
mod status;
mod step;
mod text;

pub use case::{Attachment, CaseRecorder, FailedStep};
pub use run::{ExecutionError, RunReport, Summary};
pub use scope::StepScope;
pub use status::Status;
pub use step::StepRecorder;
