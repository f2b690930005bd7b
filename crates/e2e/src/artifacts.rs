//! Report directory layout

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::E2eResult;

/// Create `<root>/<prefix>_<YYYYmmdd_HHMMSS>` and return it
pub fn create_report_dir(root: &Path, prefix: &str, at: DateTime<Local>) -> E2eResult<PathBuf> {
    let dir = root.join(format!("{}_{}", prefix, at.format("%Y%m%d_%H%M%S")));
    std::fs::create_dir_all(&dir)?;
    info!("Report directory: {}", dir.display());
    Ok(dir)
}
