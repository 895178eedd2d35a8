//! Quick-build trigger graph
//!
//! An edge `A -> B` means that whenever `A` is reinserted, `B` must be
//! reinserted as well. Triggers chain transitively.

use crate::error::ConfigError;
use crate::insertable::Insertable;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct TriggerGraph {
    graph: DiGraph<Insertable, ()>,
    index: HashMap<Insertable, NodeIndex>,
}

impl TriggerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from `(trigger, triggered)` pairs, rejecting any cycle.
    pub fn from_pairs(pairs: &[(Insertable, Insertable)]) -> Result<Self, ConfigError> {
        let mut triggers = Self::new();
        for (source, target) in pairs {
            if source == target {
                return Err(ConfigError::CyclicTriggers);
            }
            let source = triggers.node(source);
            let target = triggers.node(target);
            triggers.graph.update_edge(source, target, ());
        }

        // Acyclic exactly when every strongly connected component is a single vertex
        if tarjan_scc(&triggers.graph).iter().any(|component| component.len() > 1) {
            return Err(ConfigError::CyclicTriggers);
        }
        Ok(triggers)
    }

    fn node(&mut self, insertable: &Insertable) -> NodeIndex {
        if let Some(&idx) = self.index.get(insertable) {
            return idx;
        }
        let idx = self.graph.add_node(insertable.clone());
        self.index.insert(insertable.clone(), idx);
        idx
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Everything reachable from `source`, not including `source` itself.
    pub fn triggered_by(&self, source: &Insertable) -> BTreeSet<Insertable> {
        let Some(&start) = self.index.get(source) else {
            return BTreeSet::new();
        };
        let mut reached = BTreeSet::new();
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != start {
                reached.insert(self.graph[idx].clone());
            }
        }
        reached
    }
}
