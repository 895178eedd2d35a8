//! Resolvers for the external insertion tools

pub mod amk;
pub mod gps;
pub mod pixi;
pub mod uberasm;

use crate::resolver::ToolResolver;
use romforge_core::paths::{from_literal, is_rooted_literal};
use romforge_core::{DependencyGraph, Tool, VertexId};
use std::path::{Path, PathBuf};

/// How a tool is run: where its executable lives, its option string and the ROM it patches.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub exe_path: PathBuf,
    pub options: String,
    pub output_path: PathBuf,
}

impl ToolInvocation {
    pub fn new(exe_path: impl Into<PathBuf>, options: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        ToolInvocation {
            exe_path: exe_path.into(),
            options: options.into(),
            output_path: output_path.into(),
        }
    }

    /// Folder containing the executable; tools resolve their own files against it.
    pub fn tool_dir(&self) -> PathBuf {
        self.exe_path.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

/// Get the resolver for a tool
pub fn get_resolver(tool: Tool, invocation: &ToolInvocation) -> anyhow::Result<Box<dyn ToolResolver>> {
    Ok(match tool {
        Tool::Pixi => Box::new(pixi::PixiResolver::new(invocation)?),
        Tool::Gps => Box::new(gps::GpsResolver::new(invocation)?),
        Tool::AddMusicK => Box::new(amk::AmkResolver::new(invocation)?),
        Tool::UberAsm => Box::new(uberasm::UberAsmResolver::new(invocation)?),
    })
}

/// One file every run of a tool depends on.
#[derive(Debug, Clone)]
pub(crate) struct RootDependency<K> {
    pub path: PathBuf,
    pub tag: String,
    pub kind: K,
    /// Use a name-sensitive vertex, for files picked up by folder enumeration.
    pub named: bool,
}

impl<K> RootDependency<K> {
    pub fn new(path: impl Into<PathBuf>, tag: impl Into<String>, kind: K) -> Self {
        RootDependency {
            path: path.into(),
            tag: tag.into(),
            kind,
            named: false,
        }
    }

    pub fn named(path: impl Into<PathBuf>, tag: impl Into<String>, kind: K) -> Self {
        RootDependency {
            named: true,
            ..Self::new(path, tag, kind)
        }
    }
}

/// Attach each root dependency to `root` with a unique edge.
///
/// `follow` is called for every dependency that exists, so the tool can scan it
/// according to its kind.
pub(crate) fn attach_root_dependencies<K: Copy>(
    graph: &mut DependencyGraph,
    root: VertexId,
    dependencies: &[RootDependency<K>],
    mut follow: impl FnMut(&mut DependencyGraph, VertexId, K) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    for dependency in dependencies {
        let vertex = if dependency.named {
            graph.get_or_create_named(&dependency.path)?
        } else {
            graph.get_or_create(&dependency.path)?
        };
        graph.try_add_unique_edge(root, vertex, dependency.tag.as_str(), false);

        if graph[vertex].is_hashed() {
            follow(graph, vertex, dependency.kind)?;
        }
    }
    Ok(())
}

/// Link a folder the tool needs as a Missing vertex when it does not exist.
pub(crate) fn require_folder(graph: &mut DependencyGraph, root: VertexId, folder: &Path, tag: &str) {
    if !folder.is_dir() {
        let missing = graph.get_or_create_missing(folder);
        graph.try_add_unique_edge(root, missing, tag, false);
    }
}

/// Files directly inside (or anywhere below) `dir`, in sorted order.
///
/// `extension` filters case-insensitively; an absent folder yields nothing.
pub(crate) fn files_in(dir: &Path, extension: Option<&str>, recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = ignore::WalkBuilder::new(dir);
    walker.standard_filters(false);
    if !recursive {
        walker.max_depth(Some(1));
    }

    let mut files = Vec::new();
    for entry in walker.build() {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let matches = match extension {
            Some(wanted) => entry
                .path()
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted)),
            None => true,
        };
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Resolve a path given on a tool's command line against `base`.
pub(crate) fn option_path(base: &Path, literal: &str) -> PathBuf {
    if is_rooted_literal(literal) {
        from_literal(literal)
    } else {
        base.join(from_literal(literal))
    }
}

/// Parse a hexadecimal slot number, case-insensitively.
pub(crate) fn parse_hex(number: &str) -> Option<u64> {
    u64::from_str_radix(number.trim(), 16).ok()
}
