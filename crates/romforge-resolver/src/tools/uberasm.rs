//! Per-level code tool (UberASM Tool) resolver

use super::{attach_root_dependencies, files_in, option_path, parse_hex, require_folder, RootDependency, ToolInvocation};
use crate::asar::AsarResolver;
use crate::resolver::{ResolveContext, ToolResolver};
use regex::Regex;
use romforge_core::{DependencyGraph, Tool, VertexId};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    Asar,
    Binary,
    List,
}

/// Which part of the list a code file is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListVar {
    Level,
    Overworld,
    Gamemode,
    Global,
    Statusbar,
    MacroLib,
}

impl ListVar {
    fn parse(keyword: &str) -> Self {
        match keyword.to_ascii_lowercase().as_str() {
            "overworld" => ListVar::Overworld,
            "gamemode" => ListVar::Gamemode,
            "global" => ListVar::Global,
            "statusbar" => ListVar::Statusbar,
            "macrolib" => ListVar::MacroLib,
            _ => ListVar::Level,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            ListVar::Level => "level",
            ListVar::Overworld => "overworld",
            ListVar::Gamemode => "gamemode",
            ListVar::Global => "global",
            ListVar::Statusbar => "statusbar",
            ListVar::MacroLib => "macrolib",
        }
    }
}

pub struct UberAsmResolver {
    exe_path: PathBuf,
    tool_dir: PathBuf,
    list_file: PathBuf,
    section: Regex,
    entry: Regex,
    single_file: Regex,
}

impl UberAsmResolver {
    pub fn new(invocation: &ToolInvocation) -> anyhow::Result<Self> {
        let tool_dir = invocation.tool_dir();

        // The only option the tool takes is an alternative list file
        let list_name = match invocation.options.trim() {
            "" => "list.txt",
            other => other,
        };

        Ok(UberAsmResolver {
            exe_path: invocation.exe_path.clone(),
            list_file: option_path(&tool_dir, list_name),
            tool_dir,
            section: Regex::new(r"(?i)^\s*(?P<section>level|overworld|gamemode):")?,
            entry: Regex::new(r"^\s*(?P<number>[a-fA-F0-9]+)\s+(?P<path>.*?)(?:\s*$|\s+;.*$)")?,
            single_file: Regex::new(r"(?i)^\s*(?P<kind>global|statusbar|macrolib):\s+(?P<path>.*?)(?:\s*$|\s+;.*$)")?,
        })
    }

    fn library_dir(&self) -> PathBuf {
        self.tool_dir.join("library")
    }

    fn root_dependencies(&self) -> anyhow::Result<Vec<RootDependency<RootKind>>> {
        let mut dependencies = vec![
            RootDependency::new(&self.exe_path, "exe", RootKind::Binary),
            RootDependency::new(self.tool_dir.join("asar.dll"), "asar", RootKind::Binary),
            RootDependency::new(self.tool_dir.join("asm/base/main.asm"), "main", RootKind::Asar),
        ];
        for library_file in files_in(&self.library_dir(), None, true)? {
            dependencies.push(RootDependency::named(library_file, "library", RootKind::Asar));
        }
        dependencies.push(RootDependency::new(&self.list_file, "list", RootKind::List));
        Ok(dependencies)
    }

    fn resolve_list(
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
        let mut section: Option<ListVar> = None;

        for line in String::from_utf8_lossy(&contents).lines() {
            if line.trim().is_empty() || line.trim_start().starts_with(';') {
                continue;
            }

            // global:, statusbar: and macrolib: may appear anywhere, even before the first section
            if let Some(caps) = self.single_file.captures(line) {
                let kind = ListVar::parse(&caps["kind"]);
                self.resolve_code_file(graph, list, &caps["path"], kind.tag().to_string(), kind, asar, ctx)?;
                continue;
            }

            if let Some(caps) = self.section.captures(line) {
                section = Some(ListVar::parse(&caps["section"]));
                continue;
            }

            // Numbered entries only count inside a section
            let (Some(current), Some(caps)) = (section, self.entry.captures(line)) else {
                continue;
            };
            let Some(number) = parse_hex(&caps["number"]) else {
                continue;
            };
            let tag = format!("{}_{}", current.tag(), number);
            self.resolve_code_file(graph, list, &caps["path"], tag, current, asar, ctx)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_code_file(
        &self,
        graph: &mut DependencyGraph,
        list: VertexId,
        relative_path: &str,
        tag: String,
        kind: ListVar,
        asar: &AsarResolver,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        let base = match kind {
            ListVar::Level => self.tool_dir.join("level"),
            ListVar::Overworld => self.tool_dir.join("overworld"),
            ListVar::Gamemode => self.tool_dir.join("gamemode"),
            ListVar::Global | ListVar::Statusbar | ListVar::MacroLib => self.tool_dir.clone(),
        };

        let code = graph.get_or_create(&option_path(&base, relative_path))?;
        graph.add_edge(list, code, tag);

        if graph[code].is_hashed() {
            asar.resolve(graph, code, ctx)
        } else {
            Ok(())
        }
    }
}

impl ToolResolver for UberAsmResolver {
    fn tool(&self) -> Tool {
        Tool::UberAsm
    }

    fn resolve(&self, graph: &mut DependencyGraph, root: VertexId) -> anyhow::Result<()> {
        let asar = AsarResolver::new()?;
        let mut ctx = ResolveContext::new();
        let dependencies = self.root_dependencies()?;

        attach_root_dependencies(graph, root, &dependencies, |graph, vertex, kind| match kind {
            RootKind::Asar => asar.resolve(graph, vertex, &mut ctx),
            RootKind::Binary => Ok(()),
            RootKind::List => self.resolve_list(graph, vertex, &asar, &mut ctx),
        })?;

        require_folder(graph, root, &self.library_dir(), "library_folder");

        tracing::debug!("Resolved {} dependencies", Tool::UberAsm);
        Ok(())
    }
}
