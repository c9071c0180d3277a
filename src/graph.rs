//! Dependency Grapher
//!
//! Directed graph over component ids where an edge `A → B` means "A
//! requires B first". Only components with at least one edge take part.
//!
//! Ordering uses Kahn's algorithm with a min-heap keyed by first-seen
//! position, so components with no ordering relationship keep their
//! declaration order. When Kahn's algorithm stalls, the leftover nodes
//! contain at least one cycle; a depth-first walk over them reports the
//! first cycle in declaration order with exactly its members.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{LinkError, LinkResult};

/// Min-heap entry ordered by first-seen position.
#[derive(Debug, PartialEq, Eq)]
struct MinHeapEntry {
    position: usize,
}

impl Ord for MinHeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other.position.cmp(&self.position)
    }
}

impl PartialOrd for MinHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// node → prerequisites, in first-seen order
    requires: IndexMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(component, prerequisites)` pairs in declaration order.
    pub fn from_dependencies<'a, I>(dependencies: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let mut graph = Self::new();
        for (component, prerequisites) in dependencies {
            for prerequisite in prerequisites {
                graph.add_edge(component, prerequisite);
            }
        }
        graph
    }

    /// Record that `from` requires `to` first. Duplicate edges are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let edges = self.requires.entry(from.to_string()).or_default();
        if !edges.iter().any(|e| e == to) {
            edges.push(to.to_string());
        }
        self.requires.entry(to.to_string()).or_default();
    }

    pub fn node_count(&self) -> usize {
        self.requires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requires.is_empty()
    }

    pub fn prerequisites(&self, node: &str) -> &[String] {
        self.requires.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Topological order, prerequisites first.
    pub fn topological_order(&self) -> LinkResult<Vec<String>> {
        let n = self.requires.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (idx, (_, prerequisites)) in self.requires.iter().enumerate() {
            for prerequisite in prerequisites {
                if let Some(p) = self.requires.get_index_of(prerequisite) {
                    in_degree[idx] += 1;
                    dependents[p].push(idx);
                }
            }
        }

        let mut heap: BinaryHeap<MinHeapEntry> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(position, _)| MinHeapEntry { position })
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(MinHeapEntry { position }) = heap.pop() {
            order.push(position);
            for &next in &dependents[position] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    heap.push(MinHeapEntry { position: next });
                }
            }
        }

        if order.len() != n {
            let sorted: BTreeSet<usize> = order.into_iter().collect();
            let remaining: Vec<usize> = (0..n).filter(|i| !sorted.contains(i)).collect();
            let members = self.find_cycle(&remaining);
            debug!(?members, "Dependency cycle detected");
            return Err(LinkError::DependencyCycle { members });
        }

        Ok(order
            .into_iter()
            .filter_map(|i| self.requires.get_index(i).map(|(k, _)| k.clone()))
            .collect())
    }

    /// First cycle reachable among the nodes Kahn's algorithm left behind.
    fn find_cycle(&self, remaining: &[usize]) -> Vec<String> {
        let in_remaining: BTreeSet<usize> = remaining.iter().copied().collect();
        let mut done = BTreeSet::new();

        for &start in remaining {
            if done.contains(&start) {
                continue;
            }
            let mut path: Vec<usize> = Vec::new();
            if let Some(cycle) = self.walk(start, &in_remaining, &mut path, &mut done) {
                return cycle
                    .into_iter()
                    .filter_map(|i| self.requires.get_index(i).map(|(k, _)| k.clone()))
                    .collect();
            }
        }

        // Kahn leftovers always contain a cycle; report them all if the walk
        // somehow found none.
        remaining
            .iter()
            .filter_map(|&i| self.requires.get_index(i).map(|(k, _)| k.clone()))
            .collect()
    }

    fn walk(
        &self,
        node: usize,
        in_remaining: &BTreeSet<usize>,
        path: &mut Vec<usize>,
        done: &mut BTreeSet<usize>,
    ) -> Option<Vec<usize>> {
        if let Some(pos) = path.iter().position(|&p| p == node) {
            return Some(path[pos..].to_vec());
        }
        if done.contains(&node) {
            return None;
        }

        path.push(node);
        if let Some((_, prerequisites)) = self.requires.get_index(node) {
            for prerequisite in prerequisites {
                let Some(next) = self.requires.get_index_of(prerequisite) else {
                    continue;
                };
                if !in_remaining.contains(&next) {
                    continue;
                }
                if let Some(cycle) = self.walk(next, in_remaining, path, done) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        done.insert(node);
        None
    }
}
