use std::collections::{HashMap, HashSet, VecDeque};

use coopos_core::Location;
use indexmap::IndexMap;
use serde::Serialize;

use crate::topology::Topology;

/// An undirected, weighted connection between two locations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub a: Location,
    pub b: Location,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
pub struct GraphStats {
    pub location_count: usize,
    pub edge_count: usize,
    pub closed_count: usize,
}

/// In-memory adjacency store for arbitrary location graphs.
///
/// Locations keep insertion order so traversals over the same graph are
/// reproducible. Re-adding an existing edge bumps its weight instead of
/// duplicating it.
#[derive(Debug, Clone, Default)]
pub struct LocationGraph {
    adjacency: IndexMap<Location, Vec<Location>>,
    edge_index: HashMap<(Location, Location), usize>,
    pub edges: Vec<Edge>,
    closed: HashSet<Location>,
}

fn edge_key(a: &str, b: &str) -> (Location, Location) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl LocationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(a, b)` pairs.
    pub fn from_edges<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut graph = Self::new();
        for (a, b) in pairs {
            graph.add_edge(a, b);
        }
        graph
    }

    pub fn add_location(&mut self, location: &str) {
        if !self.adjacency.contains_key(location) {
            self.adjacency.insert(location.to_string(), Vec::new());
        }
    }

    pub fn add_edge(&mut self, a: &str, b: &str) -> usize {
        let key = edge_key(a, b);
        if let Some(&existing) = self.edge_index.get(&key) {
            self.edges[existing].weight += 1.0;
            return existing;
        }

        self.add_location(a);
        self.add_location(b);
        if let Some(list) = self.adjacency.get_mut(a) {
            list.push(b.to_string());
        }
        if a != b {
            if let Some(list) = self.adjacency.get_mut(b) {
                list.push(a.to_string());
            }
        }

        let id = self.edges.len();
        self.edges.push(Edge {
            a: key.0.clone(),
            b: key.1.clone(),
            weight: 1.0,
        });
        self.edge_index.insert(key, id);
        id
    }

    /// Mark a location as impassable. It stays in the graph.
    pub fn close(&mut self, location: &str) {
        self.closed.insert(location.to_string());
    }

    pub fn open(&mut self, location: &str) {
        self.closed.remove(location);
    }

    pub fn is_open(&self, location: &str) -> bool {
        !self.closed.contains(location)
    }

    pub fn contains(&self, location: &str) -> bool {
        self.adjacency.contains_key(location)
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.adjacency.keys()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            location_count: self.adjacency.len(),
            edge_count: self.edges.len(),
            closed_count: self.closed.len(),
        }
    }

    /// Unweighted hop distance from `from` to `to`, ignoring closures.
    pub fn hop_distance(&self, from: &str, to: &str) -> Option<u32> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(0);
        }

        let mut seen: HashMap<&str, u32> = HashMap::new();
        let mut queue = VecDeque::new();
        seen.insert(from, 0);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let dist = seen[current];
            for next in self.adjacency.get(current).into_iter().flatten() {
                if seen.contains_key(next.as_str()) {
                    continue;
                }
                if next == to {
                    return Some(dist + 1);
                }
                seen.insert(next.as_str(), dist + 1);
                queue.push_back(next.as_str());
            }
        }
        None
    }
}

impl Topology for LocationGraph {
    fn neighbors(&self, location: &str) -> Vec<Location> {
        self.adjacency.get(location).cloned().unwrap_or_default()
    }

    fn is_available(&self, location: &str) -> bool {
        self.contains(location) && !self.closed.contains(location)
    }

    fn linear_distance(&self, a: &str, b: &str) -> Option<u32> {
        self.hop_distance(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// a - b - c - d, plus a dangling e - f
    fn build_line() -> LocationGraph {
        LocationGraph::from_edges([("a", "b"), ("b", "c"), ("c", "d"), ("e", "f")])
    }

    #[test]
    fn neighbors_are_undirected() {
        let g = build_line();
        assert_eq!(g.neighbors("b"), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(g.neighbors("a"), vec!["b".to_string()]);
        assert!(g.neighbors("zzz").is_empty());
    }

    #[test]
    fn duplicate_edge_bumps_weight() {
        let mut g = build_line();
        let first = g.add_edge("a", "b");
        let second = g.add_edge("b", "a");
        assert_eq!(first, second);
        assert_eq!(g.edges[first].weight, 3.0);
        assert_eq!(g.neighbors("a").len(), 1);
    }

    #[test]
    fn hop_distance_and_disconnection() {
        let g = build_line();
        assert_eq!(g.linear_distance("a", "d"), Some(3));
        assert_eq!(g.linear_distance("d", "a"), Some(3));
        assert_eq!(g.linear_distance("a", "a"), Some(0));
        assert_eq!(g.linear_distance("a", "e"), None);
        assert_eq!(g.linear_distance("a", "nowhere"), None);
    }

    #[test]
    fn closed_locations_are_unavailable() {
        let mut g = build_line();
        g.close("c");
        assert!(!g.is_available("c"));
        assert!(g.is_available("b"));
        assert!(!g.is_available("nowhere"));
        // Closure does not change straight-line distance.
        assert_eq!(g.linear_distance("a", "d"), Some(3));
        g.open("c");
        assert!(g.is_available("c"));
    }

    #[test]
    fn stats_counts() {
        let mut g = build_line();
        g.close("f");
        let stats = g.stats();
        assert_eq!(stats.location_count, 6);
        assert_eq!(stats.edge_count, 4);
        assert_eq!(stats.closed_count, 1);
    }
}
