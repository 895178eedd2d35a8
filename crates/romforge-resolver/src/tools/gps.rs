//! Block tool (GPS) resolver

use super::{attach_root_dependencies, files_in, option_path, require_folder, RootDependency, ToolInvocation};
use crate::asar::AsarResolver;
use crate::resolver::{ResolveContext, ToolResolver};
use regex::Regex;
use romforge_core::{DependencyGraph, Tool, VertexId};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    Asar,
    Binary,
    BlockList,
}

/// Everything below this marker in a block list is descriptions.
const DESCRIPTION_MARKER: &str = "@dsc";

const GENERATED_FILES: [(&str, &str); 7] = [
    ("__temp_settings.asm", "temp_settings"),
    ("__acts_likes_1.bin", "acts_like_1"),
    ("__acts_likes_2.bin", "acts_like_2"),
    ("_versionflag.bin", "version_flag"),
    ("__banks.bin", "banks"),
    ("__pointers_1.bin", "pointers_1"),
    ("__pointers_2.bin", "pointers_2"),
];

pub struct GpsResolver {
    exe_path: PathBuf,
    tool_dir: PathBuf,
    list_file: PathBuf,
    blocks: PathBuf,
    routines: PathBuf,
    block_entry: Regex,
    whitespace: Regex,
}

impl GpsResolver {
    pub fn new(invocation: &ToolInvocation) -> anyhow::Result<Self> {
        let tool_dir = invocation.tool_dir();
        let mut resolver = GpsResolver {
            exe_path: invocation.exe_path.clone(),
            list_file: tool_dir.join("list.txt"),
            blocks: tool_dir.join("blocks"),
            routines: tool_dir.join("routines"),
            tool_dir,
            block_entry: Regex::new(
                r"^\s*(?P<number>(?:R\s*)?(?:[a-fA-F0-9]+(?::\s*[a-fA-F0-9]+)?)(?:-\s*[a-fA-F0-9]+)?(?::\s*[a-fA-F0-9]+)?)\s+(?P<path>[^\n;]+?)\s*$",
            )?,
            whitespace: Regex::new(r"\s+")?,
        };

        // -l, -b and -s relocate the list, blocks and routines; the last one wins
        let passed_directories = Regex::new(r#"-(?P<kind>[lbs])\s+(?:"(?P<quoted>[^"]*)"|(?P<bare>[^\s"]+))"#)?;
        for caps in passed_directories.captures_iter(&invocation.options) {
            let Some(literal) = caps.name("quoted").or_else(|| caps.name("bare")) else {
                continue;
            };
            let path = option_path(&resolver.tool_dir, literal.as_str());
            match &caps["kind"] {
                "l" => resolver.list_file = path,
                "b" => resolver.blocks = path,
                "s" => resolver.routines = path,
                _ => {}
            }
        }
        Ok(resolver)
    }

    fn asar(&self) -> anyhow::Result<AsarResolver> {
        let mut asar = AsarResolver::new()?;
        for (name, tag) in GENERATED_FILES {
            asar.name_generated(&self.tool_dir.join(name), tag);
        }
        Ok(asar)
    }

    fn root_dependencies(&self) -> anyhow::Result<Vec<RootDependency<RootKind>>> {
        let mut dependencies = vec![
            RootDependency::new(&self.exe_path, "exe", RootKind::Binary),
            RootDependency::new(self.tool_dir.join("asar.dll"), "asar", RootKind::Binary),
            RootDependency::new(self.tool_dir.join("main.asm"), "main", RootKind::Asar),
        ];
        for routine in files_in(&self.routines, Some("asm"), false)? {
            dependencies.push(RootDependency::named(routine, "routine", RootKind::Asar));
        }
        dependencies.push(RootDependency::new(&self.list_file, "list", RootKind::BlockList));
        Ok(dependencies)
    }

    fn resolve_block_list(
        &self,
        graph: &mut DependencyGraph,
        list: VertexId,
        asar: &AsarResolver,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        if !ctx.mark_seen(list) {
            return Ok(());
        }
        let contents = std::fs::read(&self.list_file)?;

        for line in String::from_utf8_lossy(&contents).lines() {
            if line.trim_start().starts_with(DESCRIPTION_MARKER) {
                break;
            }
            let Some(caps) = self.block_entry.captures(line) else {
                continue;
            };

            let number = self.whitespace.replace_all(&caps["number"], "").to_lowercase();
            let block = graph.get_or_create(&option_path(&self.blocks, &caps["path"]))?;
            graph.add_edge(list, block, format!("block_{}", number));

            if graph[block].is_hashed() {
                asar.resolve(graph, block, ctx)?;
            }
        }
        Ok(())
    }
}

impl ToolResolver for GpsResolver {
    fn tool(&self) -> Tool {
        Tool::Gps
    }

    fn resolve(&self, graph: &mut DependencyGraph, root: VertexId) -> anyhow::Result<()> {
        let asar = self.asar()?;
        let mut ctx = ResolveContext::new();
        let dependencies = self.root_dependencies()?;

        attach_root_dependencies(graph, root, &dependencies, |graph, vertex, kind| match kind {
            RootKind::Asar => asar.resolve(graph, vertex, &mut ctx),
            RootKind::Binary => Ok(()),
            RootKind::BlockList => self.resolve_block_list(graph, vertex, &asar, &mut ctx),
        })?;

        require_folder(graph, root, &self.routines, "routine_folder");

        tracing::debug!("Resolved {} dependencies", Tool::Gps);
        Ok(())
    }
}
