//! Canonical path identity for file-backed vertices

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Identity key of a file-backed vertex: absolute, lower-cased and `/`-separated.
///
/// Two references to the same file collapse to the same key no matter how the
/// referencing source spelled the path (relative segments, separator style, case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    pub fn new(path: &Path) -> Self {
        let absolute = absolute_path(path);
        CanonicalPath(normalize_separators(&absolute.to_string_lossy()).to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve `path` against the working directory and fold `.` and `..` lexically.
///
/// The file system is never consulted, so this works for paths that do not exist.
pub fn absolute_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    clean(&joined)
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Turn `\` into `/` and drop trailing separators (but keep a lone root).
pub fn normalize_separators(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let trimmed = replaced.trim_end_matches('/');
    if trimmed.is_empty() && replaced.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalized form of a user-declared relative path (patch names, level files).
pub fn normalize_relative(path: &str) -> String {
    normalize_separators(path.trim()).to_lowercase()
}

/// Interpret a path literal found inside a source or list file.
///
/// Sources are routinely written with Windows separators, so both are accepted.
pub fn from_literal(literal: &str) -> PathBuf {
    PathBuf::from(literal.trim().replace('\\', "/"))
}

/// Whether a path literal is rooted (`/x`, `\x` or a drive-letter path).
pub fn is_rooted_literal(literal: &str) -> bool {
    let literal = literal.trim();
    let bytes = literal.as_bytes();
    let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    drive || literal.starts_with('/') || literal.starts_with('\\')
}

/// Render `path` relative to `base` with `/` separators, or absolute if outside it.
pub fn display_relative(base: &Path, path: &Path) -> String {
    let base = absolute_path(base);
    let path = absolute_path(path);
    match path.strip_prefix(&base) {
        Ok(relative) => normalize_separators(&relative.to_string_lossy()),
        Err(_) => normalize_separators(&path.to_string_lossy()),
    }
}
