//! Test utilities for Romforge

use std::fs;
use std::path::Path;
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
