pub mod influence;
pub mod mst;
pub mod priority_queue;
pub mod union_find;

pub use influence::{InfluenceMap, Progress, Propagation};
pub use mst::minimum_spanning_forest;
pub use priority_queue::{PriorityQueue, SortOrder};
pub use union_find::UnionFind;
