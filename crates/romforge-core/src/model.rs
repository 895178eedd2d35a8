//! Core data structures for the dependency graph

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::paths::CanonicalPath;

/// Dense index of a vertex inside one graph instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct VertexId(pub u64);

/// External insertion tools whose whole input set hangs off a single root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tool {
    #[serde(rename = "pixi")]
    Pixi,
    #[serde(rename = "gps")]
    Gps,
    #[serde(rename = "addmusick")]
    AddMusicK,
    #[serde(rename = "uberasm")]
    UberAsm,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Gps, Tool::Pixi, Tool::AddMusicK, Tool::UberAsm];

    /// Human readable tool name used in diagnostics.
    pub fn display_name(self) -> &'static str {
        match self {
            Tool::Pixi => "PIXI",
            Tool::Gps => "GPS",
            Tool::AddMusicK => "AddmusicK",
            Tool::UberAsm => "UberASM Tool",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A file location: the identity key plus the path actually used for I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub canonical: CanonicalPath,
    pub path: PathBuf,
}

impl FileRef {
    pub fn new(path: &Path) -> Self {
        FileRef {
            canonical: CanonicalPath::new(path),
            path: crate::paths::absolute_path(path),
        }
    }

    /// Base name of the file, e.g. `math.asm`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// A node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vertex {
    // ── Content-addressed files ─────────────────────────────
    HashedFile {
        file: FileRef,
        digest: Digest,
    },
    /// Same content under a different name means something different.
    HashedFileWithName {
        file: FileRef,
        digest: Digest,
        file_name: String,
    },

    // ── Markers ─────────────────────────────────────────────
    Missing {
        file: FileRef,
    },
    /// A reference that cannot be resolved without evaluating the source.
    Arbitrary,
    /// Written by a tool run, never an input.
    Generated {
        file: FileRef,
    },

    // ── Roots ───────────────────────────────────────────────
    ToolRoot {
        tool: Tool,
    },
    PatchRoot {
        file: FileRef,
        digest: Digest,
        relative_path: String,
    },
    ModuleRoot {
        file: FileRef,
        digest: Digest,
        name: String,
        file_name: String,
    },
}

/// Discriminant of [`Vertex`], handy for filtering and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexKind {
    HashedFile,
    HashedFileWithName,
    Missing,
    Arbitrary,
    Generated,
    ToolRoot,
    PatchRoot,
    ModuleRoot,
}

impl Vertex {
    pub fn kind(&self) -> VertexKind {
        match self {
            Vertex::HashedFile { .. } => VertexKind::HashedFile,
            Vertex::HashedFileWithName { .. } => VertexKind::HashedFileWithName,
            Vertex::Missing { .. } => VertexKind::Missing,
            Vertex::Arbitrary => VertexKind::Arbitrary,
            Vertex::Generated { .. } => VertexKind::Generated,
            Vertex::ToolRoot { .. } => VertexKind::ToolRoot,
            Vertex::PatchRoot { .. } => VertexKind::PatchRoot,
            Vertex::ModuleRoot { .. } => VertexKind::ModuleRoot,
        }
    }

    /// Backing file, for every file-backed variant.
    pub fn file(&self) -> Option<&FileRef> {
        match self {
            Vertex::HashedFile { file, .. }
            | Vertex::HashedFileWithName { file, .. }
            | Vertex::Missing { file }
            | Vertex::Generated { file }
            | Vertex::PatchRoot { file, .. }
            | Vertex::ModuleRoot { file, .. } => Some(file),
            Vertex::Arbitrary | Vertex::ToolRoot { .. } => None,
        }
    }

    pub fn digest(&self) -> Option<&Digest> {
        match self {
            Vertex::HashedFile { digest, .. }
            | Vertex::HashedFileWithName { digest, .. }
            | Vertex::PatchRoot { digest, .. }
            | Vertex::ModuleRoot { digest, .. } => Some(digest),
            _ => None,
        }
    }

    /// Base name for name-sensitive variants.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Vertex::HashedFileWithName { file_name, .. }
            | Vertex::ModuleRoot { file_name, .. } => Some(file_name),
            _ => None,
        }
    }

    /// Existing input file whose content may be scanned for further references.
    pub fn is_hashed(&self) -> bool {
        self.digest().is_some()
    }

    pub fn is_root(&self) -> bool {
        matches!(
            self,
            Vertex::ToolRoot { .. } | Vertex::PatchRoot { .. } | Vertex::ModuleRoot { .. }
        )
    }
}

/// A tagged dependency edge: `source` depends on `target` in the role `tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: VertexId,
    pub target: VertexId,
    pub tag: String,
}
