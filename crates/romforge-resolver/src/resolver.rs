//! Resolver trait definition

use romforge_core::{DependencyGraph, Tool, VertexId};
use std::collections::HashSet;

/// Per-pass traversal state shared by every resolver working on one root.
#[derive(Debug, Default)]
pub struct ResolveContext {
    seen: HashSet<VertexId>,
    stack: Vec<VertexId>,
}

impl ResolveContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as scanned; returns false if it already was.
    ///
    /// Only call this for a vertex whose content is about to be scanned.
    pub fn mark_seen(&mut self, id: VertexId) -> bool {
        self.seen.insert(id)
    }

    /// Whether `id` is currently being scanned further up the include chain.
    pub fn is_active(&self, id: VertexId) -> bool {
        self.stack.contains(&id)
    }

    pub(crate) fn enter(&mut self, id: VertexId) {
        self.stack.push(id);
    }

    pub(crate) fn leave(&mut self) {
        self.stack.pop();
    }
}

/// Walks one external tool's fixed inputs and list files below its root.
pub trait ToolResolver {
    fn tool(&self) -> Tool;

    /// Add every dependency of the tool below `root`.
    ///
    /// A reference to an absent file becomes a Missing vertex; it never aborts
    /// the walk.
    fn resolve(&self, graph: &mut DependencyGraph, root: VertexId) -> anyhow::Result<()>;
}
