//! Static dependency graph over the modules of one section
//!
//! Used to put the modules of a sorted raw section into load order, so that
//! plain concatenation executes every dependency before its dependents.

use std::{cmp::Reverse, collections::BinaryHeap};

use anyhow::Result;
use log::{debug, warn};
use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
};

use crate::{module_name::to_resource_name, pool::ModulePool, types::FxIndexMap};

#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// Edges point from a dependency to its dependent
    graph: DiGraph<String, ()>,
    node_indices: FxIndexMap<String, NodeIndex>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of `modules`, keeping only edges between them
    pub fn from_pool(pool: &dyn ModulePool, modules: &[String]) -> Result<Self> {
        let mut graph = Self::new();
        for module in modules {
            graph.add_module(module);
        }
        for module in modules {
            let info = match pool.get_module_info(module) {
                Ok(info) => info,
                Err(err) if err.is_not_found() => {
                    debug!("No metadata for {module}, treating it as dependency-free");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            for dependency in &info.dependencies {
                graph.add_dependency(module, &to_resource_name(dependency));
            }
        }
        Ok(graph)
    }

    pub fn add_module(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_owned());
        self.node_indices.insert(name.to_owned(), idx);
        idx
    }

    /// Record that `from` depends on `to`; ignored unless both are known
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let (Some(&from_idx), Some(&to_idx)) =
            (self.node_indices.get(from), self.node_indices.get(to))
            && !self.graph.contains_edge(to_idx, from_idx)
        {
            self.graph.add_edge(to_idx, from_idx, ());
        }
    }

    /// Dependencies first; unrelated modules keep their insertion order
    ///
    /// Modules caught in a cycle cannot be ordered; they are appended in
    /// insertion order after everything that could be sorted.
    pub fn stable_topological_order(&self) -> Vec<String> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count()
            })
            .collect();

        // min-heap on insertion index keeps the sort stable
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut emitted = vec![false; in_degree.len()];
        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(idx)) = ready.pop() {
            emitted[idx] = true;
            let node = NodeIndex::new(idx);
            order.push(self.graph[node].clone());
            for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                let degree = &mut in_degree[dependent.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(dependent.index()));
                }
            }
        }

        if order.len() < emitted.len() {
            let cyclic: Vec<&str> = emitted
                .iter()
                .enumerate()
                .filter(|(_, done)| !**done)
                .map(|(idx, _)| self.graph[NodeIndex::new(idx)].as_str())
                .collect();
            warn!(
                "Cyclic dependencies between {}; keeping their original order",
                cyclic.join(", ")
            );
            order.extend(cyclic.into_iter().map(str::to_owned));
        }
        order
    }
}
