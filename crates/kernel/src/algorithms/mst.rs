use coopos_graph::store::Edge;
use coopos_graph::LocationGraph;
use tracing::debug;

use super::priority_queue::{PriorityQueue, SortOrder};
use super::union_find::UnionFind;

/// Kruskal's minimum spanning forest over `graph`.
///
/// Edges are taken lightest first; ties keep the graph's insertion order.
/// Closed locations are ignored. Returns one tree per connected component,
/// flattened into a single edge list.
pub fn minimum_spanning_forest(graph: &LocationGraph) -> Vec<Edge> {
    let mut queue = PriorityQueue::new(|edge: &&Edge| edge.weight, SortOrder::Ascending);
    queue.extend(graph.edges.iter().filter(|e| {
        e.a != e.b && graph.is_open(&e.a) && graph.is_open(&e.b)
    }));

    let mut sets: UnionFind<&str> = UnionFind::new();
    for location in graph.locations().filter(|l| graph.is_open(l)) {
        sets.insert(location.as_str());
    }

    let mut forest = Vec::new();
    while let Some(edge) = queue.pop_front() {
        if sets.union(edge.a.as_str(), edge.b.as_str()) {
            forest.push(edge.clone());
        }
    }

    debug!(
        edges = forest.len(),
        components = sets.count(),
        "built minimum spanning forest"
    );
    forest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_lightest_edges() {
        // square a-b-c-d with a heavy diagonal and a heavy a-b side
        let mut g = LocationGraph::from_edges([
            ("a", "b"),
            ("b", "c"),
            ("c", "d"),
            ("d", "a"),
            ("a", "c"),
        ]);
        g.add_edge("a", "b");
        g.add_edge("a", "c");
        g.add_edge("a", "c");

        let forest = minimum_spanning_forest(&g);
        assert_eq!(forest.len(), 3);
        let total: f64 = forest.iter().map(|e| e.weight).sum();
        assert_eq!(total, 3.0);
        assert!(forest.iter().all(|e| !(e.a == "a" && e.b == "c")));
    }

    #[test]
    fn disconnected_graph_yields_a_forest() {
        let g = LocationGraph::from_edges([("a", "b"), ("b", "c"), ("x", "y")]);
        let forest = minimum_spanning_forest(&g);
        assert_eq!(forest.len(), 3);
    }

    #[test]
    fn closed_locations_are_skipped() {
        let mut g = LocationGraph::from_edges([("a", "b"), ("b", "c")]);
        g.close("c");
        let forest = minimum_spanning_forest(&g);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].b, "b");
    }
}
