//! Assembler source scanning
//!
//! Follows `incsrc`, `incbin` and `table` directives through a tree of asar
//! sources. Every directive becomes one tagged edge from the scanned file; only
//! `incsrc` targets are scanned in turn.

use crate::resolver::ResolveContext;
use crate::tools::option_path;
use romforge_core::paths::{from_literal, is_rooted_literal};
use romforge_core::{CanonicalPath, DependencyGraph, VertexId};
use regex::Regex;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Source,
    Binary,
    Table,
}

impl Directive {
    fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_lowercase().as_str() {
            "incsrc" => Some(Directive::Source),
            "incbin" => Some(Directive::Binary),
            "table" => Some(Directive::Table),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Directive::Source => "source",
            Directive::Binary => "binary",
            Directive::Table => "table",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Include {
    Found(PathBuf),
    NotFound(PathBuf),
    Generated(PathBuf, String),
    Arbitrary,
}

pub struct AsarResolver {
    directive: Regex,
    include_dirs: Vec<PathBuf>,
    generated: Vec<(CanonicalPath, String)>,
}

impl AsarResolver {
    pub fn new() -> anyhow::Result<Self> {
        Ok(AsarResolver {
            directive: Regex::new(
                r#"(?i)^\s*(?P<method>incsrc|incbin|table)\s+(?:"(?P<quoted>[^"]*)"|(?P<bare>\S*))"#,
            )?,
            include_dirs: Vec::new(),
            generated: Vec::new(),
        })
    }

    /// Extra directories searched after the including file's own directory, in order.
    ///
    /// See [`include_dirs_from_options`] for the directories asar itself is given.
    pub fn with_include_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include_dirs.extend(dirs);
        self
    }

    /// Register a file written by the tool itself; includes of it get `tag`.
    pub fn name_generated(&mut self, path: &Path, tag: impl Into<String>) {
        self.generated.push((CanonicalPath::new(path), tag.into()));
    }

    /// Scan `vertex` and everything it pulls in with `incsrc`.
    pub fn resolve(
        &self,
        graph: &mut DependencyGraph,
        vertex: VertexId,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        if !ctx.mark_seen(vertex) {
            return Ok(());
        }
        let Some(path) = graph[vertex].file().map(|f| f.path.clone()) else {
            return Ok(());
        };
        if !graph[vertex].is_hashed() {
            return Ok(());
        }

        let bytes = std::fs::read(&path)?;
        let contents = String::from_utf8_lossy(&bytes);

        ctx.enter(vertex);
        let result = self.scan(graph, vertex, &path, &contents, ctx);
        ctx.leave();
        result
    }

    fn scan(
        &self,
        graph: &mut DependencyGraph,
        vertex: VertexId,
        path: &Path,
        contents: &str,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        let mut dependency_id = 0;

        for line in contents.lines() {
            let Some(caps) = self.directive.captures(line) else {
                continue;
            };
            let Some(directive) = caps.name("method").and_then(|m| Directive::parse(m.as_str())) else {
                continue;
            };
            let literal = caps
                .name("quoted")
                .or_else(|| caps.name("bare"))
                .map(|m| m.as_str())
                .unwrap_or_default();
            if literal.is_empty() {
                continue;
            }

            let (dependency, tag) = match self.locate(path, literal) {
                Include::Arbitrary => (graph.create_arbitrary(), format!("arbitrary_{}", directive.tag())),
                Include::Found(found) | Include::NotFound(found) => {
                    (graph.get_or_create(&found)?, directive.tag().to_string())
                }
                Include::Generated(generated, tag) => (graph.get_or_create_generated(&generated), tag),
            };
            graph.add_edge(vertex, dependency, format!("{}_{}", tag, dependency_id));
            dependency_id += 1;

            // Binaries and tables are leaves; the same file may still be an incsrc target later
            if directive != Directive::Source || !graph[dependency].is_hashed() {
                continue;
            }
            if ctx.is_active(dependency) {
                tracing::warn!(
                    "Include cycle: {} includes {}, which is already being scanned",
                    path.display(),
                    graph[dependency]
                        .file()
                        .map(|f| f.path.display().to_string())
                        .unwrap_or_default()
                );
                continue;
            }
            self.resolve(graph, dependency, ctx)?;
        }

        Ok(())
    }

    /// Find what an include literal refers to.
    ///
    /// A rooted literal is tried on its own. A relative one is tried next to the
    /// including file, then in each include directory. The last candidate is
    /// reported when nothing matches.
    fn locate(&self, including_file: &Path, literal: &str) -> Include {
        // Defines (`!name`) and macro arguments (`<name>`) cannot be evaluated statically
        if literal.contains(['!', '<', '>']) {
            return Include::Arbitrary;
        }

        let relative = from_literal(literal);
        let candidates: Vec<PathBuf> = if is_rooted_literal(literal) {
            vec![relative]
        } else {
            let base = including_file.parent().unwrap_or_else(|| Path::new(""));
            std::iter::once(base.join(&relative))
                .chain(self.include_dirs.iter().map(|dir| dir.join(&relative)))
                .collect()
        };

        for candidate in &candidates {
            if let Some(tag) = self.generated_tag(candidate) {
                return Include::Generated(candidate.clone(), tag.to_string());
            }
            if candidate.is_file() {
                return Include::Found(candidate.clone());
            }
        }

        match candidates.into_iter().last() {
            Some(last) => Include::NotFound(last),
            None => Include::Arbitrary,
        }
    }

    fn generated_tag(&self, path: &Path) -> Option<&str> {
        let canonical = CanonicalPath::new(path);
        self.generated
            .iter()
            .find(|(generated, _)| *generated == canonical)
            .map(|(_, tag)| tag.as_str())
    }
}

/// Include directories named on an asar command line with `-I` or `--include`.
///
/// Relative directories are resolved against `base`, the folder asar runs in.
pub fn include_dirs_from_options(options: &str, base: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let include = Regex::new(
        r#"(?:^|\s)(?:-I\s*|--include(?:\s+|=))(?:"(?P<quoted>[^"]*)"|(?P<bare>[^\s"]+))"#,
    )?;

    Ok(include
        .captures_iter(options)
        .filter_map(|caps| caps.name("quoted").or_else(|| caps.name("bare")))
        .filter(|literal| !literal.as_str().is_empty())
        .map(|literal| option_path(base, literal.as_str()))
        .collect())
}
