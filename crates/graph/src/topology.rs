use coopos_core::Location;

/// Read-only view of the location adjacency graph.
///
/// Implemented independently by every concrete world representation; the
/// kernel and its algorithms only ever see this trait.
pub trait Topology {
    /// Locations reachable in one hop from `location`.
    fn neighbors(&self, location: &str) -> Vec<Location>;

    /// Whether a traversal may enter `location`.
    fn is_available(&self, _location: &str) -> bool {
        true
    }

    /// Straight-line distance in hops, ignoring walls and closures.
    /// `None` when either location is unknown.
    fn linear_distance(&self, a: &str, b: &str) -> Option<u32>;
}

impl<T: Topology + ?Sized> Topology for &T {
    fn neighbors(&self, location: &str) -> Vec<Location> {
        (**self).neighbors(location)
    }

    fn is_available(&self, location: &str) -> bool {
        (**self).is_available(location)
    }

    fn linear_distance(&self, a: &str, b: &str) -> Option<u32> {
        (**self).linear_distance(a, b)
    }
}
