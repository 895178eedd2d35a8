//! Build the dependency graph of a configured project

use crate::config::Config;
use crate::insertable::Insertable;
use anyhow::Context;
use romforge_core::{DependencyGraph, Tool, Vertex};
use romforge_resolver::{
    get_resolver, include_dirs_from_options, ModuleResolver, PatchResolver, ResolveContext, ToolInvocation,
};
use std::path::{Path, PathBuf};

/// Resolve every module, tool and patch the configuration uses.
///
/// Modules are resolved first so that sources including a module file collapse
/// onto its root. Tools only get a root when they are configured and named in
/// the build order. Patches and modules share one traversal context, and the
/// include directories from `asar_options`.
pub fn build_graph(config: &Config) -> anyhow::Result<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    let mut ctx = ResolveContext::new();
    let asar = config.asar_path();
    let include_dirs =
        include_dirs_from_options(config.asar_options.as_deref().unwrap_or_default(), &config.project_dir())?;

    if let Some(folder) = config.globules_dir() {
        resolve_modules(&mut graph, &folder, asar.as_deref(), &include_dirs, &mut ctx)?;
    }

    for tool in [Tool::AddMusicK, Tool::Pixi, Tool::Gps, Tool::UberAsm] {
        let Some(exe_path) = config.tool_path(tool) else {
            continue;
        };
        if !config.uses(&Insertable::from(tool)) {
            continue;
        }
        let invocation = ToolInvocation::new(
            exe_path,
            config.tool_options(tool).unwrap_or_default(),
            config.output_path().unwrap_or_default(),
        );
        let resolver = get_resolver(tool, &invocation)?;
        let root = graph.tool_root_or_create(tool);
        resolver
            .resolve(&mut graph, root)
            .with_context(|| format!("Failed to resolve {} dependencies", tool))?;
    }

    // Register every patch before resolving, so a patch included by another keeps its own root
    let patch_resolver = PatchResolver::new(asar.as_deref())?.with_include_dirs(&include_dirs);
    let mut roots = Vec::with_capacity(config.patches.len());
    for patch in &config.patches {
        roots.push((patch, graph.add_patch_root(&config.patch_path(patch), patch)?));
    }
    for (patch, root) in roots {
        if matches!(graph[root], Vertex::PatchRoot { .. }) {
            patch_resolver
                .resolve(&mut graph, root, &mut ctx)
                .with_context(|| format!("Failed to resolve patch '{}'", patch))?;
        }
    }

    tracing::info!(
        "Dependency graph has {} vertices and {} edges",
        graph.vertex_count(),
        graph.edge_count()
    );
    Ok(graph)
}

fn resolve_modules(
    graph: &mut DependencyGraph,
    folder: &Path,
    asar: Option<&Path>,
    include_dirs: &[PathBuf],
    ctx: &mut ResolveContext,
) -> anyhow::Result<()> {
    let mut modules: Vec<PathBuf> = Vec::new();
    if folder.is_dir() {
        for entry in std::fs::read_dir(folder)
            .with_context(|| format!("Failed to read modules folder '{}'", folder.display()))?
        {
            let path = entry?.path();
            let is_asm = path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("asm"));
            if path.is_file() && is_asm {
                modules.push(path);
            }
        }
    }
    modules.sort();

    // Register every module before resolving, so imports land on module roots
    let mut roots = Vec::with_capacity(modules.len());
    for module in &modules {
        roots.push(graph.add_module_root(module)?);
    }

    let resolver = ModuleResolver::new(folder, asar)?.with_include_dirs(include_dirs);
    for root in roots {
        resolver.resolve(graph, root, ctx)?;
    }

    tracing::debug!("Resolved {} modules in {}", modules.len(), folder.display());
    Ok(())
}
