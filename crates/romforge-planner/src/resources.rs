//! Whole-resource digests: inputs inserted as a unit rather than through a graph

use crate::config::Config;
use crate::insertable::Insertable;
use romforge_core::paths::{display_relative, normalize_relative};
use romforge_core::{
    hash_file, hash_folder, hash_list, hash_optional_file, serialize, DependencyGraph, Digest, Report, Tool,
};
use std::collections::BTreeMap;
use std::path::Path;

const LEVEL_EXTENSION: &str = "mwl";

/// Fresh digests of everything a report records besides the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDigests {
    pub graphics: Option<Digest>,
    pub exgraphics: Option<Digest>,
    pub map16: Option<Digest>,
    pub title_moves: Option<Digest>,
    pub shared_palettes: Option<Digest>,
    pub global_data: Option<Digest>,
    pub init_bps: Option<Digest>,
    /// Normalized level path → digest; `None` without a levels folder.
    pub levels: Option<BTreeMap<String, Digest>>,
    pub build_order_hash: Digest,
}

impl ResourceDigests {
    pub fn collect(config: &Config) -> anyhow::Result<Self> {
        let map16 = match config.human_readable_map16_dir_path() {
            Some(dir) => hash_folder(Some(&dir))?,
            None => hash_optional_file(config.map16_path().as_deref())?,
        };

        Ok(ResourceDigests {
            graphics: hash_folder(Some(&config.graphics_dir()))?,
            exgraphics: hash_folder(Some(&config.exgraphics_dir()))?,
            map16,
            title_moves: hash_optional_file(config.title_moves_path().as_deref())?,
            shared_palettes: hash_optional_file(config.shared_palette_path().as_deref())?,
            global_data: hash_optional_file(config.global_data_path().as_deref())?,
            init_bps: hash_optional_file(config.initial_patch_path().as_deref())?,
            levels: level_digests(config)?,
            build_order_hash: hash_build_order(config.build_order()),
        })
    }
}

/// Digest of the build order's textual form; reordering changes it.
pub fn hash_build_order(build_order: &[Insertable]) -> Digest {
    hash_list(build_order.iter().map(|item| match item {
        Insertable::SinglePatch(path) | Insertable::SingleLevel(path) => format!("{}:{}", item.kind_name(), path),
        other => other.kind_name().to_string(),
    }))
}

/// Digest of every level file directly in the levels folder.
pub fn level_digests(config: &Config) -> anyhow::Result<Option<BTreeMap<String, Digest>>> {
    let Some(dir) = config.levels_dir().filter(|d| d.is_dir()) else {
        return Ok(None);
    };

    let project_dir = config.project_dir();
    let mut levels = BTreeMap::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.is_file() && is_level_file(&path) {
            let key = normalize_relative(&display_relative(&project_dir, &path));
            levels.insert(key, hash_file(&path)?);
        }
    }

    tracing::debug!("Hashed {} levels in {}", levels.len(), dir.display());
    Ok(Some(levels))
}

fn is_level_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(LEVEL_EXTENSION))
}

/// Describe the current on-disk state, for reuse by the next quick build.
pub fn create_report(config: &Config, graph: &DependencyGraph) -> anyhow::Result<Report> {
    let resources = ResourceDigests::collect(config)?;

    let mut report = Report::new();
    report.rom_hash = hash_optional_file(config.output_path().as_deref())?;
    report.levels = resources.levels;
    report.dependency_graph = serialize(graph);
    report.graphics = resources.graphics;
    report.exgraphics = resources.exgraphics;
    report.init_bps = resources.init_bps;
    report.global_data = resources.global_data;
    report.title_moves = resources.title_moves;
    report.shared_palettes = resources.shared_palettes;
    report.map16 = resources.map16;
    report.build_order_hash = Some(resources.build_order_hash);
    report.asar_options = config.asar_options.clone();
    report.pixi_options = config.tool_options(Tool::Pixi).map(str::to_string);
    report.gps_options = config.tool_options(Tool::Gps).map(str::to_string);
    report.uberasm_options = config.tool_options(Tool::UberAsm).map(str::to_string);
    report.addmusick_options = config.tool_options(Tool::AddMusicK).map(str::to_string);
    report.lm_level_import_flags = config.lm_level_import_flags.clone();
    Ok(report)
}
