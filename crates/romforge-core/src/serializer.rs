//! Index-addressed persistable form of the dependency graph
//!
//! Every content-bearing vertex becomes one [`Record`]. A record lists the
//! dependencies of its vertex as `(idx, tag)` pairs, where `idx` is the position
//! of the dependency's own record. Vertices that carry no content (missing,
//! arbitrary and generated files) get no record; edges to them use a negative
//! sentinel index instead.

use crate::digest::Digest;
use crate::error::RecordError;
use crate::graph::DependencyGraph;
use crate::model::{Tool, Vertex, VertexId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MISSING_INDEX: i64 = -1;
pub const ARBITRARY_INDEX: i64 = -2;
pub const GENERATED_INDEX: i64 = -3;

/// One `(idx, tag)` back-reference stored on a dependent's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDependency {
    pub tag: String,
    pub idx: i64,
}

/// What a [`RecordDependency`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTarget {
    Record(usize),
    Missing,
    Arbitrary,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKind {
    Hash { hash: Digest },
    HashWithName { hash: Digest, file_name: String },
    PatchRoot { hash: Digest, path: String },
    ModuleRoot { hash: Digest, file_name: String },
    ToolRoot { tool: Tool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub kind: RecordKind,
    #[serde(default)]
    pub dependencies: Vec<RecordDependency>,
}

impl Record {
    fn new(kind: RecordKind) -> Self {
        Record { kind, dependencies: Vec::new() }
    }

    pub fn digest(&self) -> Option<&Digest> {
        match &self.kind {
            RecordKind::Hash { hash }
            | RecordKind::HashWithName { hash, .. }
            | RecordKind::PatchRoot { hash, .. }
            | RecordKind::ModuleRoot { hash, .. } => Some(hash),
            RecordKind::ToolRoot { .. } => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match &self.kind {
            RecordKind::HashWithName { file_name, .. } | RecordKind::ModuleRoot { file_name, .. } => {
                Some(file_name)
            }
            _ => None,
        }
    }
}

/// Serialize `graph` bottom-up, starting from every sink.
///
/// Each edge is written exactly once, when its target is visited. Sinks come
/// first, and vertices that only sit on dependency cycles are picked up by a
/// final sweep.
pub fn serialize(graph: &DependencyGraph) -> Vec<Record> {
    let mut serializer = Serializer {
        graph,
        slots: HashMap::new(),
        records: Vec::new(),
    };

    let sinks: Vec<VertexId> = graph.sinks().collect();
    for sink in sinks {
        serializer.visit(sink);
    }
    for id in graph.vertex_ids() {
        serializer.visit(id);
    }

    tracing::debug!(
        "Serialized {} vertices into {} records",
        graph.vertex_count(),
        serializer.records.len()
    );
    serializer.records
}

struct Serializer<'g> {
    graph: &'g DependencyGraph,
    slots: HashMap<VertexId, i64>,
    records: Vec<Record>,
}

impl Serializer<'_> {
    fn visit(&mut self, id: VertexId) {
        if self.slots.contains_key(&id) {
            return;
        }

        let idx = self.slot_for(id);
        self.slots.insert(id, idx);

        let incoming: Vec<(VertexId, String)> = self
            .graph
            .edges_to(id)
            .map(|e| (e.source, e.tag.clone()))
            .collect();

        for (dependent, tag) in incoming {
            self.visit(dependent);
            match self.slots.get(&dependent) {
                Some(&slot) if slot >= 0 => {
                    self.records[slot as usize]
                        .dependencies
                        .push(RecordDependency { tag, idx });
                }
                _ => tracing::warn!("Dropping edge '{}' from a vertex without a record", tag),
            }
        }
    }

    fn slot_for(&mut self, id: VertexId) -> i64 {
        let kind = match &self.graph[id] {
            Vertex::Missing { .. } => return MISSING_INDEX,
            Vertex::Arbitrary => return ARBITRARY_INDEX,
            Vertex::Generated { .. } => return GENERATED_INDEX,
            Vertex::HashedFile { digest, .. } => RecordKind::Hash { hash: digest.clone() },
            Vertex::HashedFileWithName { digest, file_name, .. } => RecordKind::HashWithName {
                hash: digest.clone(),
                file_name: file_name.clone(),
            },
            Vertex::PatchRoot { digest, relative_path, .. } => RecordKind::PatchRoot {
                hash: digest.clone(),
                path: relative_path.clone(),
            },
            Vertex::ModuleRoot { digest, file_name, .. } => RecordKind::ModuleRoot {
                hash: digest.clone(),
                file_name: file_name.clone(),
            },
            Vertex::ToolRoot { tool } => RecordKind::ToolRoot { tool: *tool },
        };
        self.records.push(Record::new(kind));
        (self.records.len() - 1) as i64
    }
}

/// A validated record list as loaded back from a previous run.
#[derive(Debug, Clone, Default)]
pub struct SerializedGraph {
    records: Vec<Record>,
}

impl SerializedGraph {
    /// Check that every dependency index is a sentinel or an existing record.
    pub fn new(records: Vec<Record>) -> Result<Self, RecordError> {
        let len = records.len();
        for (record, r) in records.iter().enumerate() {
            for dependency in &r.dependencies {
                let valid = match dependency.idx {
                    MISSING_INDEX | ARBITRARY_INDEX | GENERATED_INDEX => true,
                    idx => idx >= 0 && (idx as usize) < len,
                };
                if !valid {
                    return Err(RecordError::DanglingIndex { record, idx: dependency.idx, len });
                }
            }
        }
        Ok(SerializedGraph { records })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, idx: usize) -> Option<&Record> {
        self.records.get(idx)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolve a validated dependency to its target.
    pub fn target(&self, dependency: &RecordDependency) -> RecordTarget {
        match dependency.idx {
            MISSING_INDEX => RecordTarget::Missing,
            ARBITRARY_INDEX => RecordTarget::Arbitrary,
            GENERATED_INDEX => RecordTarget::Generated,
            idx => RecordTarget::Record(idx as usize),
        }
    }

    pub fn tool_root(&self, tool: Tool) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.kind == RecordKind::ToolRoot { tool })
    }

    pub fn patch_roots(&self) -> impl Iterator<Item = (usize, &Record)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r.kind, RecordKind::PatchRoot { .. }))
    }

    pub fn module_roots(&self) -> impl Iterator<Item = (usize, &Record)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r.kind, RecordKind::ModuleRoot { .. }))
    }
}
