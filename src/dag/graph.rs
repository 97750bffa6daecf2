// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use crate::engine::TaskName;
use crate::errors::DefinitionError;

/// Task dependency graph keyed by task id.
///
/// Nodes are identified internally by their declaration index, which is what
/// makes every ordering this type hands out deterministic. Edges point from
/// upstream to downstream. Every mutation keeps the graph acyclic and leaves
/// it untouched when it returns an error.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    names: Vec<TaskName>,
    index: HashMap<TaskName, usize>,
    edges: DiGraphMap<usize, ()>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a task together with its upstream tasks.
    ///
    /// Every upstream must already be declared. A freshly declared task has
    /// no downstream, so this alone can never close a cycle.
    pub fn add_task(&mut self, id: &str, upstream: &[&str]) -> Result<(), DefinitionError> {
        if self.index.contains_key(id) {
            return Err(DefinitionError::DuplicateTask(id.to_string()));
        }

        let mut upstream_idx = Vec::with_capacity(upstream.len());
        for up in upstream {
            match self.index.get(*up) {
                Some(&idx) => upstream_idx.push(idx),
                None => {
                    return Err(DefinitionError::UnknownUpstream {
                        task: id.to_string(),
                        upstream: up.to_string(),
                    });
                }
            }
        }

        let idx = self.names.len();
        self.names.push(id.to_string());
        self.index.insert(id.to_string(), idx);
        self.edges.add_node(idx);
        for up in upstream_idx {
            self.edges.add_edge(up, idx, ());
        }

        Ok(())
    }

    /// Add a dependency edge `upstream -> downstream` between declared tasks.
    ///
    /// Re-adding an existing edge is a no-op.
    pub fn add_edge(&mut self, upstream: &str, downstream: &str) -> Result<(), DefinitionError> {
        let up = self.lookup(upstream)?;
        let down = self.lookup(downstream)?;

        if up == down || has_path_connecting(&self.edges, down, up, None) {
            return Err(DefinitionError::Cycle {
                upstream: upstream.to_string(),
                downstream: downstream.to_string(),
            });
        }

        self.edges.add_edge(up, down, ());
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All task ids in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    /// Direct upstream tasks of `id`, in declaration order.
    pub fn upstream_of(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct downstream tasks of `id`, in declaration order.
    pub fn downstream_of(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Tasks with no upstream, in declaration order.
    pub fn roots(&self) -> Vec<&str> {
        (0..self.names.len())
            .filter(|&idx| {
                self.edges
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.names[idx].as_str())
            .collect()
    }

    /// A linearization where every edge points forward.
    ///
    /// Among tasks that are ready at the same time, the one declared first
    /// comes first. Used for diagnostics only; execution order is driven by
    /// completions.
    pub fn topological_order(&self) -> Vec<&str> {
        let mut in_degree: Vec<usize> = (0..self.names.len())
            .map(|idx| {
                self.edges
                    .neighbors_directed(idx, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut heap: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(Reverse(idx)) = heap.pop() {
            order.push(self.names[idx].as_str());
            for next in self.edges.neighbors_directed(idx, Direction::Outgoing) {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    heap.push(Reverse(next));
                }
            }
        }

        order
    }

    fn lookup(&self, id: &str) -> Result<usize, DefinitionError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| DefinitionError::UnknownTask(id.to_string()))
    }

    fn neighbors(&self, id: &str, dir: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };

        let mut found: Vec<usize> = self.edges.neighbors_directed(idx, dir).collect();
        found.sort_unstable();
        found.into_iter().map(|i| self.names[i].as_str()).collect()
    }
}
