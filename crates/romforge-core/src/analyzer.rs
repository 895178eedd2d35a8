//! Structural comparison of a freshly resolved graph against persisted records

use crate::graph::DependencyGraph;
use crate::model::{Tool, Vertex, VertexId};
use crate::paths::display_relative;
use crate::serializer::{Record, RecordKind, RecordTarget, SerializedGraph};
use std::collections::HashSet;
use std::path::Path;

/// Why a root's subtree is (or is not) stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Nothing differs.
    Identical,
    /// No previous record for this root: first build of the subtree.
    NewRoot,
    /// Neither a previous nor a current root exists.
    NoRoots,
    /// A previous root exists but the current configuration has none.
    OldRoot,
    Missing,
    Arbitrary,
    ModifiedFile,
    ModifiedDependencies,
}

impl Verdict {
    pub fn describe(self) -> &'static str {
        match self {
            Verdict::Identical => "Unchanged dependency",
            Verdict::NewRoot => "New dependency",
            Verdict::NoRoots => "No dependencies",
            Verdict::OldRoot => "Removed dependency",
            Verdict::Missing => "Missing dependency",
            Verdict::Arbitrary => "Arbitrary dependency",
            Verdict::ModifiedFile => "Modified dependency",
            Verdict::ModifiedDependencies => "Modified dependency list",
        }
    }
}

/// A verdict plus the dependency chain from the root to the offending vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub verdict: Verdict,
    pub chain: Vec<VertexId>,
}

impl Analysis {
    pub fn identical() -> Self {
        Analysis { verdict: Verdict::Identical, chain: Vec::new() }
    }

    fn at(verdict: Verdict, chain: Vec<VertexId>) -> Self {
        Analysis { verdict, chain }
    }

    pub fn is_identical(&self) -> bool {
        self.verdict == Verdict::Identical
    }

    /// The vertex where the difference was detected.
    pub fn offending(&self) -> Option<VertexId> {
        self.chain.last().copied()
    }
}

/// Result of matching the current patch or module roots against previous ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootComparison {
    /// A previously inserted root can no longer be accounted for.
    Removed { detail: String },
    Compared(Vec<(VertexId, Analysis)>),
}

// Comparable shape of one outgoing edge, without content digests. Digests are
// checked by the dependency itself once the pairing is known.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    File { name: Option<String> },
    Missing,
    Arbitrary,
    Generated,
}

struct LiveEdge {
    tag: String,
    slot: Slot,
    sort_digest: String,
    target: VertexId,
}

struct StoredEdge {
    tag: String,
    slot: Slot,
    sort_digest: String,
    target: Option<usize>,
}

pub struct GraphAnalyzer<'a> {
    graph: &'a DependencyGraph,
    old: &'a SerializedGraph,
}

impl<'a> GraphAnalyzer<'a> {
    pub fn new(graph: &'a DependencyGraph, old: &'a SerializedGraph) -> Self {
        GraphAnalyzer { graph, old }
    }

    /// Compare the subtree under `root` with the subtree under record `old_root`.
    pub fn compare(&self, root: VertexId, old_root: usize) -> Analysis {
        let mut seen = HashSet::new();
        self.compare_subtree(root, old_root, &mut seen)
    }

    /// Analyze one tool root, handling roots that appeared or disappeared.
    pub fn analyze_tool(&self, tool: Tool) -> Analysis {
        match (self.old.tool_root(tool), self.graph.tool_root(tool)) {
            (None, Some(new_root)) => Analysis::at(Verdict::NewRoot, vec![new_root]),
            (None, None) => Analysis::at(Verdict::NoRoots, Vec::new()),
            (Some(_), None) => Analysis::at(Verdict::OldRoot, Vec::new()),
            (Some(old_root), Some(new_root)) => self.compare(new_root, old_root),
        }
    }

    /// Match current patch roots against previous ones by digest or path.
    ///
    /// A previous patch that matches no current patch by either must have been
    /// removed, which the previous output cannot be undone from.
    pub fn analyze_patches(&self) -> RootComparison {
        let new_roots: Vec<(VertexId, &str, &str)> = self
            .graph
            .patch_roots()
            .iter()
            .filter_map(|&id| match &self.graph[id] {
                Vertex::PatchRoot { digest, relative_path, .. } => {
                    Some((id, digest.as_str(), relative_path.as_str()))
                }
                _ => None,
            })
            .collect();
        let old_roots: Vec<(usize, &str, &str)> = self
            .old
            .patch_roots()
            .filter_map(|(idx, r)| match &r.kind {
                RecordKind::PatchRoot { hash, path } => Some((idx, hash.as_str(), path.as_str())),
                _ => None,
            })
            .collect();

        if old_roots.len() > new_roots.len() {
            return RootComparison::Removed {
                detail: format!(
                    "{} patches were previously inserted, but only {} are configured now",
                    old_roots.len(),
                    new_roots.len()
                ),
            };
        }

        for &(_, old_hash, old_path) in &old_roots {
            let matched = new_roots
                .iter()
                .any(|&(_, hash, path)| hash == old_hash || path == old_path);
            if !matched {
                return RootComparison::Removed {
                    detail: format!("Patch '{}' was previously inserted but is gone", old_path),
                };
            }
        }

        let mut results = Vec::new();
        for &(id, hash, path) in &new_roots {
            let exact = old_roots.iter().find(|&&(_, h, p)| h == hash && p == path);
            let either = old_roots.iter().find(|&&(_, h, p)| h == hash || p == path);
            let analysis = match exact.or(either) {
                Some(&(old_idx, _, _)) => self.compare(id, old_idx),
                None => Analysis::at(Verdict::NewRoot, vec![id]),
            };
            results.push((id, analysis));
        }
        RootComparison::Compared(results)
    }

    /// Match current module roots against previous ones by base name.
    pub fn analyze_modules(&self) -> RootComparison {
        let new_roots: Vec<(VertexId, &str)> = self
            .graph
            .module_roots()
            .iter()
            .filter_map(|&id| self.graph[id].file_name().map(|name| (id, name)))
            .collect();
        let old_roots: Vec<(usize, &str)> = self
            .old
            .module_roots()
            .filter_map(|(idx, r)| r.file_name().map(|name| (idx, name)))
            .collect();

        if let Some((_, gone)) = old_roots
            .iter()
            .find(|(_, old_name)| !new_roots.iter().any(|(_, name)| name == old_name))
        {
            return RootComparison::Removed {
                detail: format!("Module '{}' was previously inserted but is gone", gone),
            };
        }

        let results = new_roots
            .iter()
            .map(|&(id, name)| {
                let analysis = match old_roots.iter().find(|(_, old_name)| *old_name == name) {
                    Some(&(old_idx, _)) => self.compare(id, old_idx),
                    None => Analysis::at(Verdict::NewRoot, vec![id]),
                };
                (id, analysis)
            })
            .collect();
        RootComparison::Compared(results)
    }

    fn compare_subtree(&self, vertex: VertexId, record: usize, seen: &mut HashSet<VertexId>) -> Analysis {
        if !seen.insert(vertex) {
            return Analysis::identical();
        }

        match &self.graph[vertex] {
            Vertex::Missing { .. } => return Analysis::at(Verdict::Missing, vec![vertex]),
            Vertex::Arbitrary => return Analysis::at(Verdict::Arbitrary, vec![vertex]),
            _ => {}
        }

        let Some(old) = self.old.get(record) else {
            return Analysis::at(Verdict::ModifiedFile, vec![vertex]);
        };

        let live = self.live_edges(vertex);
        let stored = self.stored_edges(old);

        // Structure first: a slot added to or removed from a list is reported
        // at the list, not at whatever content change came with it.
        if live.len() != stored.len() {
            return Analysis::at(Verdict::ModifiedDependencies, vec![vertex]);
        }
        for (l, s) in live.iter().zip(stored.iter()) {
            if l.tag != s.tag || l.slot != s.slot {
                return match l.slot {
                    Slot::Missing if l.tag == s.tag => Analysis::at(Verdict::Missing, vec![vertex, l.target]),
                    _ => Analysis::at(Verdict::ModifiedDependencies, vec![vertex]),
                };
            }
        }

        if !self.same_content(vertex, old) {
            return Analysis::at(Verdict::ModifiedFile, vec![vertex]);
        }

        for edge in &live {
            match edge.slot {
                Slot::Arbitrary => return Analysis::at(Verdict::Arbitrary, vec![vertex, edge.target]),
                Slot::Missing => return Analysis::at(Verdict::Missing, vec![vertex, edge.target]),
                _ => {}
            }
        }

        for (l, s) in live.iter().zip(stored.iter()) {
            let (Slot::File { .. }, Some(old_target)) = (&l.slot, s.target) else {
                continue;
            };
            let mut result = self.compare_subtree(l.target, old_target, seen);
            if !result.is_identical() {
                result.chain.insert(0, vertex);
                return result;
            }
        }

        Analysis::identical()
    }

    fn same_content(&self, vertex: VertexId, old: &Record) -> bool {
        match (&self.graph[vertex], &old.kind) {
            (Vertex::ToolRoot { tool }, RecordKind::ToolRoot { tool: old_tool }) => tool == old_tool,
            (Vertex::HashedFile { digest, .. }, RecordKind::Hash { hash }) => digest == hash,
            (Vertex::PatchRoot { digest, .. }, RecordKind::PatchRoot { hash, .. }) => digest == hash,
            (live, RecordKind::HashWithName { hash, file_name })
            | (live @ Vertex::ModuleRoot { .. }, RecordKind::ModuleRoot { hash, file_name }) => {
                live.digest() == Some(hash) && live.file_name() == Some(file_name.as_str())
            }
            _ => false,
        }
    }

    fn live_edges(&self, vertex: VertexId) -> Vec<LiveEdge> {
        let mut edges: Vec<LiveEdge> = self
            .graph
            .edges_from(vertex)
            .map(|e| {
                let target = &self.graph[e.target];
                let slot = match target {
                    Vertex::Missing { .. } => Slot::Missing,
                    Vertex::Arbitrary => Slot::Arbitrary,
                    Vertex::Generated { .. } => Slot::Generated,
                    _ => Slot::File { name: target.file_name().map(str::to_string) },
                };
                LiveEdge {
                    tag: e.tag.clone(),
                    slot,
                    sort_digest: target.digest().map(|d| d.to_string()).unwrap_or_default(),
                    target: e.target,
                }
            })
            .collect();
        edges.sort_by(|a, b| (&a.tag, &a.slot, &a.sort_digest).cmp(&(&b.tag, &b.slot, &b.sort_digest)));
        edges
    }

    fn stored_edges(&self, record: &Record) -> Vec<StoredEdge> {
        let mut edges: Vec<StoredEdge> = record
            .dependencies
            .iter()
            .map(|d| {
                let (slot, sort_digest, target) = match self.old.target(d) {
                    RecordTarget::Missing => (Slot::Missing, String::new(), None),
                    RecordTarget::Arbitrary => (Slot::Arbitrary, String::new(), None),
                    RecordTarget::Generated => (Slot::Generated, String::new(), None),
                    RecordTarget::Record(idx) => {
                        let target = self.old.get(idx);
                        let name = target.and_then(|r| r.file_name()).map(str::to_string);
                        let digest = target
                            .and_then(|r| r.digest())
                            .map(|d| d.to_string())
                            .unwrap_or_default();
                        (Slot::File { name }, digest, Some(idx))
                    }
                };
                StoredEdge { tag: d.tag.clone(), slot, sort_digest, target }
            })
            .collect();
        edges.sort_by(|a, b| (&a.tag, &a.slot, &a.sort_digest).cmp(&(&b.tag, &b.slot, &b.sort_digest)));
        edges
    }
}

/// Render a dependency chain for diagnostics, e.g. `GPS -> list.txt -> blocks/coin.asm`.
pub fn describe_chain(graph: &DependencyGraph, chain: &[VertexId], base: &Path) -> String {
    chain
        .iter()
        .map(|&id| match &graph[id] {
            Vertex::ToolRoot { tool } => tool.display_name().to_string(),
            Vertex::PatchRoot { relative_path, .. } => relative_path.clone(),
            Vertex::ModuleRoot { name, .. } => name.clone(),
            Vertex::Arbitrary => "Arbitrary file(s)".to_string(),
            other => other
                .file()
                .map(|f| display_relative(base, &f.path))
                .unwrap_or_else(|| "Unknown file".to_string()),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}
