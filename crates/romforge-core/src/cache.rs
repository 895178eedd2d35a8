//! On-disk state next to the build output

use crate::report::{Report, StaleReport, REPORT_FORMAT_VERSION};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// State directory: .romforge/
pub const STATE_DIR: &str = ".romforge";

/// Build report file
pub const REPORT_FILE: &str = "build_report.json";

/// Get state directory path
pub fn state_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(STATE_DIR)
}

/// Get build report file path
pub fn report_path(output_dir: &Path) -> PathBuf {
    output_dir.join(STATE_DIR).join(REPORT_FILE)
}

/// Ensure state directory exists
pub fn ensure_state_dir(output_dir: &Path) -> std::io::Result<()> {
    let dir = state_dir(output_dir);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}

/// Write the report as pretty JSON.
pub fn save_report(report: &Report, output_dir: &Path) -> anyhow::Result<()> {
    ensure_state_dir(output_dir)?;
    let path = report_path(output_dir);

    let json_str = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json_str)?;

    tracing::debug!("Build report saved: {}", path.display());
    Ok(())
}

#[derive(Deserialize)]
struct VersionHeader {
    report_format_version: u32,
}

/// Load the previous report.
///
/// Never fails hard: every way a report can be unusable is reported as a
/// [`StaleReport`] reason instead.
pub fn load_report(output_dir: &Path) -> Result<Report, StaleReport> {
    let path = report_path(output_dir);
    if !path.is_file() {
        return Err(StaleReport::Absent);
    }

    let json_str = std::fs::read_to_string(&path).map_err(|e| StaleReport::Corrupt(e.to_string()))?;

    let header: VersionHeader =
        serde_json::from_str(&json_str).map_err(|e| StaleReport::Corrupt(e.to_string()))?;
    if header.report_format_version != REPORT_FORMAT_VERSION {
        return Err(StaleReport::IncompatibleVersion {
            found: header.report_format_version,
            expected: REPORT_FORMAT_VERSION,
        });
    }

    let report: Report =
        serde_json::from_str(&json_str).map_err(|e| StaleReport::Corrupt(e.to_string()))?;

    tracing::debug!("Build report loaded from: {}", path.display());
    Ok(report)
}

/// Clear state directory
pub fn clear_state(output_dir: &Path) -> std::io::Result<()> {
    let dir = state_dir(output_dir);
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    Ok(())
}
