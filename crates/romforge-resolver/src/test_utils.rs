//! Test utilities for resolver tests

use std::fs;
use std::path::Path;
use romforge_core::{DependencyGraph, VertexId};
use tempfile::TempDir;

/// Create a temporary project with the given `(relative path, content)` files
pub fn create_tree(files: &[(&str, &str)]) -> TempDir {
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

/// Tags of the edges leaving `source`, in insertion order
pub fn tags_from(graph: &DependencyGraph, source: VertexId) -> Vec<String> {
    graph.edges_from(source).map(|e| e.tag.clone()).collect()
}

/// Target of the edge leaving `source` with `tag`
pub fn target_of(graph: &DependencyGraph, source: VertexId, tag: &str) -> Option<VertexId> {
    graph.edges_from(source).find(|e| e.tag == tag).map(|e| e.target)
}
