//! Test utilities for planner tests

use romforge_core::{load_report, save_report, DependencyGraph};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::{build_graph, create_report, BuildKind, Config, PlanOutcome, Planner};

/// Create a temporary project with the given `(relative path, content)` files
pub fn create_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (path, content) in files {
        write_file(temp_dir.path(), path, content);
    }
    temp_dir
}

/// Write a file below `root`, creating parent directories as needed
pub fn write_file(root: &Path, path: &str, content: &str) {
    let full_path = root.join(path);
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full_path, content).unwrap();
}

/// Parse configuration text without touching the file system
pub fn parse_config(source: &str) -> Result<Config, crate::ConfigError> {
    let mut config = Config::parse(Path::new("/project"), &[source])?;
    config.verify()?;
    Ok(config)
}

/// Load the project and resolve its graph
pub fn load_project(root: &Path) -> (Config, DependencyGraph) {
    let config = Config::load(root).unwrap();
    let graph = build_graph(&config).unwrap();
    (config, graph)
}

/// Pretend a full build just finished: write the output image and a fresh report
pub fn record_build(root: &Path) {
    let (config, graph) = load_project(root);
    let output = config.output_path().unwrap();
    fs::create_dir_all(output.parent().unwrap()).unwrap();
    fs::write(&output, b"rom").unwrap();

    let report = create_report(&config, &graph).unwrap();
    save_report(&report, &config.output_dir()).unwrap();
}

/// Plan a quick build against the recorded state
pub fn quick_plan(root: &Path) -> PlanOutcome {
    let (config, graph) = load_project(root);
    let previous = load_report(&config.output_dir());
    Planner::new(&config, &graph).plan(BuildKind::Quick, previous).unwrap()
}
