//! Content digests for files, folders and ordered lists

use md5::{Digest as _, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Lowercase hex MD5 of some content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Digest(format!("{:x}", Md5::digest(bytes)))
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Digest(hex.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest a file that must exist.
pub fn hash_file(path: &Path) -> std::io::Result<Digest> {
    let bytes = std::fs::read(path)?;
    Ok(Digest::of_bytes(&bytes))
}

/// Digest an optionally configured file; `None` when unset or absent.
pub fn hash_optional_file(path: Option<&Path>) -> std::io::Result<Option<Digest>> {
    match path {
        Some(path) if path.is_file() => hash_file(path).map(Some),
        _ => Ok(None),
    }
}

/// Digest a whole folder tree; `None` when unset or absent.
///
/// Files are visited in sorted path order. For each file the lower-cased relative
/// path is fed first, then the content, so renames and moves change the digest.
pub fn hash_folder(path: Option<&Path>) -> std::io::Result<Option<Digest>> {
    let Some(root) = path.filter(|p| p.is_dir()) else {
        return Ok(None);
    };

    let mut files = Vec::new();
    for entry in ignore::WalkBuilder::new(root).standard_filters(false).build() {
        let entry = entry.map_err(std::io::Error::other)?;
        if entry.file_type().is_some_and(|t| t.is_file()) {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut hasher = Md5::new();
    for file in &files {
        let relative = file.strip_prefix(root).unwrap_or(file);
        let relative = relative.to_string_lossy().replace('\\', "/").to_lowercase();
        hasher.update(relative.as_bytes());
        hasher.update(std::fs::read(file)?);
    }

    tracing::debug!("Hashed {} files under {}", files.len(), root.display());
    Ok(Some(Digest(format!("{:x}", hasher.finalize()))))
}

/// Digest an ordered list of strings; order and item boundaries both matter.
pub fn hash_list<I, S>(items: I) -> Digest
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Md5::new();
    for item in items {
        hasher.update(item.as_ref().as_bytes());
        hasher.update(b"\n");
    }
    Digest(format!("{:x}", hasher.finalize()))
}
