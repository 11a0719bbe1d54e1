//! Sub-task dependency graph
//!
//! Edges point from a dependency to its dependent, so a topological order
//! is a valid execution order.

use crate::errors::{RagError, Result};
use crate::types::{SubTask, TaskId};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Dependency graph over the sub-tasks of one query
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<TaskId, ()>,
    index: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    /// Build the graph, rejecting cycles and self-dependencies
    ///
    /// Dependencies on ids that are not in `tasks` are an error; callers
    /// sanitize model output before building.
    pub fn build(tasks: &[SubTask]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::with_capacity(tasks.len());

        for task in tasks {
            if index.contains_key(&task.id) {
                return Err(RagError::Generic(format!("Duplicate task id {}", task.id)));
            }
            index.insert(task.id, graph.add_node(task.id));
        }

        for task in tasks {
            let to = index[&task.id];
            for dep in &task.dependencies {
                let from = *index.get(dep).ok_or_else(|| {
                    RagError::Generic(format!("{} depends on unknown task {}", task.id, dep))
                })?;
                if graph.find_edge(from, to).is_none() {
                    graph.add_edge(from, to, ());
                }
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let at = graph
                .node_weight(cycle.node_id())
                .map(|id| id.to_string())
                .unwrap_or_else(|| "?".to_string());
            return Err(RagError::DecompositionCycle {
                cycle: format!("cycle through {}", at),
            });
        }

        Ok(Self { graph, index })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct dependencies of a task, ascending
    pub fn dependencies(&self, id: TaskId) -> Vec<TaskId> {
        let mut deps: Vec<TaskId> = match self.index.get(&id) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|n| self.graph[n])
                .collect(),
            None => Vec::new(),
        };
        deps.sort();
        deps
    }

    /// Topological order; among ready tasks the lowest id goes first
    pub fn execution_order(&self) -> Vec<TaskId> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| (n, self.graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();

        let mut ready: BinaryHeap<Reverse<(TaskId, NodeIndex)>> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(&n, _)| Reverse((self.graph[n], n)))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse((id, node))) = ready.pop() {
            order.push(id);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(d) = in_degree.get_mut(&next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(Reverse((self.graph[next], next)));
                    }
                }
            }
        }

        order
    }
}
