//! Dependency graph wrapper using petgraph::StableDiGraph with dense VertexIds

use crate::digest;
use crate::error::GraphError;
use crate::model::*;
use crate::paths::{normalize_relative, CanonicalPath};
use anyhow::Context;
use petgraph::graph::DiGraph;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// The dependency graph: an append-only directed multigraph of tagged edges.
///
/// File-backed vertices are deduplicated by canonical path, so every reference to
/// the same file within one resolution pass lands on the same vertex.
pub struct DependencyGraph {
    inner: StableDiGraph<Vertex, DependencyEdge>,
    by_path: HashMap<CanonicalPath, VertexId>,
    tool_roots: BTreeMap<Tool, VertexId>,
    patch_roots: Vec<VertexId>,
    module_roots: Vec<VertexId>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("vertex_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .field("tool_roots", &self.tool_roots.len())
            .field("patch_roots", &self.patch_roots.len())
            .field("module_roots", &self.module_roots.len())
            .finish()
    }
}

fn index(id: VertexId) -> NodeIndex {
    NodeIndex::new(id.0 as usize)
}

fn vertex_id(idx: NodeIndex) -> VertexId {
    VertexId(idx.index() as u64)
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            inner: StableDiGraph::new(),
            by_path: HashMap::new(),
            tool_roots: BTreeMap::new(),
            patch_roots: Vec::new(),
            module_roots: Vec::new(),
        }
    }

    fn insert(&mut self, vertex: Vertex) -> VertexId {
        let canonical = vertex.file().map(|f| f.canonical.clone());
        let id = vertex_id(self.inner.add_node(vertex));
        if let Some(canonical) = canonical {
            self.by_path.insert(canonical, id);
        }
        id
    }

    // ── Factories ───────────────────────────────────────────

    /// Existing vertex for `path`, or a new HashedFile (Missing if absent).
    ///
    /// The digest is taken once, here, and never recomputed.
    pub fn get_or_create(&mut self, path: &Path) -> anyhow::Result<VertexId> {
        if !path.is_file() {
            return Ok(self.get_or_create_missing(path));
        }
        if let Some(id) = self.find(path) {
            return Ok(id);
        }

        let file = FileRef::new(path);
        let digest = digest::hash_file(&file.path)
            .with_context(|| format!("Failed to hash '{}'", file.path.display()))?;
        Ok(self.insert(Vertex::HashedFile { file, digest }))
    }

    /// Like [`get_or_create`](Self::get_or_create) but name-sensitive.
    pub fn get_or_create_named(&mut self, path: &Path) -> anyhow::Result<VertexId> {
        if !path.is_file() {
            return Ok(self.get_or_create_missing(path));
        }
        if let Some(id) = self.find(path) {
            return Ok(id);
        }

        let file = FileRef::new(path);
        let digest = digest::hash_file(&file.path)
            .with_context(|| format!("Failed to hash '{}'", file.path.display()))?;
        let file_name = file.file_name();
        Ok(self.insert(Vertex::HashedFileWithName { file, digest, file_name }))
    }

    /// Vertex for a file a tool writes itself. Never hashed, never scanned.
    pub fn get_or_create_generated(&mut self, path: &Path) -> VertexId {
        if let Some(id) = self.find(path) {
            return id;
        }
        self.insert(Vertex::Generated { file: FileRef::new(path) })
    }

    pub fn get_or_create_missing(&mut self, path: &Path) -> VertexId {
        if let Some(id) = self.find(path) {
            return id;
        }
        self.insert(Vertex::Missing { file: FileRef::new(path) })
    }

    /// A fresh unresolvable-reference marker. Markers are never shared.
    pub fn create_arbitrary(&mut self) -> VertexId {
        self.insert(Vertex::Arbitrary)
    }

    /// The root for `tool`, created on first request.
    pub fn tool_root_or_create(&mut self, tool: Tool) -> VertexId {
        if let Some(&id) = self.tool_roots.get(&tool) {
            return id;
        }
        let id = self.insert(Vertex::ToolRoot { tool });
        self.tool_roots.insert(tool, id);
        id
    }

    /// Register a user-declared patch. Absent patch files become Missing roots.
    pub fn add_patch_root(&mut self, path: &Path, declared: &str) -> anyhow::Result<VertexId> {
        let id = if path.is_file() {
            match self.find(path) {
                Some(id) => id,
                None => {
                    let file = FileRef::new(path);
                    let digest = digest::hash_file(&file.path)
                        .with_context(|| format!("Failed to hash patch '{}'", file.path.display()))?;
                    let relative_path = normalize_relative(declared);
                    self.insert(Vertex::PatchRoot { file, digest, relative_path })
                }
            }
        } else {
            self.get_or_create_missing(path)
        };
        if !self.patch_roots.contains(&id) {
            self.patch_roots.push(id);
        }
        Ok(id)
    }

    /// Register a module file found in the modules folder.
    pub fn add_module_root(&mut self, path: &Path) -> anyhow::Result<VertexId> {
        let id = if path.is_file() {
            match self.find(path) {
                Some(id) => id,
                None => {
                    let file = FileRef::new(path);
                    let digest = digest::hash_file(&file.path)
                        .with_context(|| format!("Failed to hash module '{}'", file.path.display()))?;
                    let name = file
                        .path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let file_name = file.file_name();
                    self.insert(Vertex::ModuleRoot { file, digest, name, file_name })
                }
            }
        } else {
            self.get_or_create_missing(path)
        };
        if !self.module_roots.contains(&id) {
            self.module_roots.push(id);
        }
        Ok(id)
    }

    // ── Edges ───────────────────────────────────────────────

    /// Add a tagged edge, even if an identical one already exists.
    pub fn add_edge(&mut self, source: VertexId, target: VertexId, tag: impl Into<String>) {
        let edge = DependencyEdge { source, target, tag: tag.into() };
        self.inner.add_edge(index(source), index(target), edge);
    }

    /// Add a tagged edge unless `source` already depends on `target`.
    ///
    /// With `tag_must_match`, only an existing edge carrying the same tag counts,
    /// so one target may be linked several times under distinct tags.
    /// Returns whether an edge was inserted.
    pub fn try_add_unique_edge(
        &mut self,
        source: VertexId,
        target: VertexId,
        tag: impl Into<String>,
        tag_must_match: bool,
    ) -> bool {
        let tag = tag.into();
        let exists = self
            .edges_from(source)
            .any(|e| e.target == target && (!tag_must_match || e.tag == tag));
        if exists {
            return false;
        }
        self.add_edge(source, target, tag);
        true
    }

    // ── Queries ─────────────────────────────────────────────

    /// Get a vertex by ID.
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.inner.node_weight(index(id))
    }

    /// Find the vertex registered for a path.
    pub fn find(&self, path: &Path) -> Option<VertexId> {
        self.by_path.get(&CanonicalPath::new(path)).copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// All vertex ids in creation order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.inner.node_indices().map(vertex_id)
    }

    /// Outgoing edges of a vertex, in insertion order.
    pub fn edges_from(&self, source: VertexId) -> impl Iterator<Item = &DependencyEdge> {
        self.sorted_edges(source, Direction::Outgoing).into_iter()
    }

    /// Incoming edges of a vertex, in insertion order.
    pub fn edges_to(&self, target: VertexId) -> impl Iterator<Item = &DependencyEdge> {
        self.sorted_edges(target, Direction::Incoming).into_iter()
    }

    fn sorted_edges(&self, id: VertexId, direction: Direction) -> Vec<&DependencyEdge> {
        let mut refs: Vec<_> = self.inner.edges_directed(index(id), direction).collect();
        refs.sort_by_key(|r| r.id().index());
        refs.into_iter().map(|r| r.weight()).collect()
    }

    pub fn out_degree(&self, id: VertexId) -> usize {
        self.inner.edges_directed(index(id), Direction::Outgoing).count()
    }

    /// Vertices that directly depend on `id`.
    pub fn dependents(&self, id: VertexId) -> Vec<VertexId> {
        let mut dependents: Vec<VertexId> = Vec::new();
        for edge in self.edges_to(id) {
            if !dependents.contains(&edge.source) {
                dependents.push(edge.source);
            }
        }
        dependents
    }

    /// Vertices without dependencies, in creation order.
    pub fn sinks(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertex_ids().filter(move |&id| self.out_degree(id) == 0)
    }

    pub fn tool_root(&self, tool: Tool) -> Option<VertexId> {
        self.tool_roots.get(&tool).copied()
    }

    pub fn tool_roots(&self) -> impl Iterator<Item = (Tool, VertexId)> + '_ {
        self.tool_roots.iter().map(|(&tool, &id)| (tool, id))
    }

    pub fn patch_roots(&self) -> &[VertexId] {
        &self.patch_roots
    }

    pub fn module_roots(&self) -> &[VertexId] {
        &self.module_roots
    }

    /// Every Missing and Arbitrary vertex together with its direct dependents.
    pub fn unresolved_dependencies(&self) -> Vec<(VertexId, Vec<VertexId>)> {
        self.vertex_ids()
            .filter(|&id| {
                matches!(
                    self.vertex(id),
                    Some(Vertex::Missing { .. } | Vertex::Arbitrary)
                )
            })
            .map(|id| (id, self.dependents(id)))
            .collect()
    }

    /// Modules ordered so every module comes after the modules it imports.
    pub fn module_insertion_order(&self) -> Result<Vec<VertexId>, GraphError> {
        let mut imports: DiGraph<VertexId, ()> = DiGraph::new();
        let mut nodes = BTreeMap::new();
        for &module in &self.module_roots {
            if matches!(self.vertex(module), Some(Vertex::ModuleRoot { .. })) {
                nodes.insert(module, imports.add_node(module));
            }
        }

        for (&importer, &importer_node) in &nodes {
            for edge in self.edges_from(importer) {
                if let Some(&imported_node) = nodes.get(&edge.target) {
                    if edge.target == importer {
                        return Err(self.cycle_error(importer));
                    }
                    imports.update_edge(imported_node, importer_node, ());
                }
            }
        }

        petgraph::algo::toposort(&imports, None)
            .map(|order| order.into_iter().map(|n| imports[n]).collect())
            .map_err(|cycle| self.cycle_error(imports[cycle.node_id()]))
    }

    fn cycle_error(&self, module: VertexId) -> GraphError {
        let module = match self.vertex(module) {
            Some(Vertex::ModuleRoot { name, .. }) => name.clone(),
            _ => format!("{:?}", module),
        };
        GraphError::CyclicImports { module }
    }
}

impl std::ops::Index<VertexId> for DependencyGraph {
    type Output = Vertex;

    fn index(&self, id: VertexId) -> &Vertex {
        &self.inner[index(id)]
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
