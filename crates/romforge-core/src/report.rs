//! Persisted build report, one per build output

use crate::digest::Digest;
use crate::serializer::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bumped whenever the report layout changes incompatibly.
pub const REPORT_FORMAT_VERSION: u32 = 2;

/// Everything a later quick build needs to know about how the output was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_format_version: u32,
    /// RFC 3339 timestamp of the build.
    pub build_time: String,
    pub rom_hash: Option<Digest>,
    /// Normalized level path → level file digest; `None` if no levels folder.
    pub levels: Option<BTreeMap<String, Digest>>,
    pub dependency_graph: Vec<Record>,
    pub graphics: Option<Digest>,
    pub exgraphics: Option<Digest>,
    pub init_bps: Option<Digest>,
    pub global_data: Option<Digest>,
    pub title_moves: Option<Digest>,
    pub shared_palettes: Option<Digest>,
    pub map16: Option<Digest>,
    pub build_order_hash: Option<Digest>,
    pub asar_options: Option<String>,
    pub pixi_options: Option<String>,
    pub gps_options: Option<String>,
    pub uberasm_options: Option<String>,
    pub addmusick_options: Option<String>,
    pub lm_level_import_flags: Option<String>,
}

impl Report {
    /// An empty report stamped with the current time and format version.
    pub fn new() -> Self {
        Report {
            report_format_version: REPORT_FORMAT_VERSION,
            build_time: chrono::Utc::now().to_rfc3339(),
            rom_hash: None,
            levels: None,
            dependency_graph: Vec::new(),
            graphics: None,
            exgraphics: None,
            init_bps: None,
            global_data: None,
            title_moves: None,
            shared_palettes: None,
            map16: None,
            build_order_hash: None,
            asar_options: None,
            pixi_options: None,
            gps_options: None,
            uberasm_options: None,
            addmusick_options: None,
            lm_level_import_flags: None,
        }
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a previous report cannot be used. Always recovered by a full rebuild.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StaleReport {
    #[error("No previous build report found")]
    Absent,
    #[error("Previous build report is corrupted: {0}")]
    Corrupt(String),
    #[error("Previous build report uses format version {found}, expected {expected}")]
    IncompatibleVersion { found: u32, expected: u32 },
}
