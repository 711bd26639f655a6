use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Disjoint-set forest over arbitrary keys.
///
/// Elements are registered lazily by [`union`](UnionFind::union) or
/// explicitly by [`insert`](UnionFind::insert). When two classes merge, the
/// smaller representative survives, so the result does not depend on call
/// order. `find` walks parent links without path compression, which keeps
/// lookups `&self` at the cost of O(depth) per call.
#[derive(Debug, Clone)]
pub struct UnionFind<T> {
    parent: HashMap<T, T>,
    components: usize,
}

impl<T> UnionFind<T>
where
    T: Clone + Eq + Hash + Ord,
{
    pub fn new() -> Self {
        Self {
            parent: HashMap::new(),
            components: 0,
        }
    }

    /// Register `item` as its own class. Returns `false` if already known.
    pub fn insert(&mut self, item: T) -> bool {
        if self.parent.contains_key(&item) {
            return false;
        }
        self.parent.insert(item.clone(), item);
        self.components += 1;
        true
    }

    pub fn contains(&self, item: &T) -> bool {
        self.parent.contains_key(item)
    }

    /// Representative of `item`'s class, or `None` for unknown elements.
    pub fn find(&self, item: &T) -> Option<&T> {
        let (mut current, mut up) = self.parent.get_key_value(item)?;
        while current != up {
            (current, up) = self.parent.get_key_value(up)?;
        }
        Some(current)
    }

    /// Merge the classes of `a` and `b`, registering either if unseen.
    /// Returns `true` if two distinct classes were merged.
    pub fn union(&mut self, a: T, b: T) -> bool {
        self.insert(a.clone());
        self.insert(b.clone());

        let (Some(ra), Some(rb)) = (self.find(&a).cloned(), self.find(&b).cloned()) else {
            return false;
        };
        if ra == rb {
            return false;
        }
        let (keep, absorb) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent.insert(absorb, keep);
        self.components -= 1;
        true
    }

    /// Whether `a` and `b` are in the same class. Unknown elements are
    /// connected to nothing, not even themselves.
    pub fn connected(&self, a: &T, b: &T) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }

    /// Number of disjoint classes.
    pub fn count(&self) -> usize {
        self.components
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Every class keyed by its representative, members sorted.
    pub fn groups(&self) -> BTreeMap<T, Vec<T>> {
        let mut groups: BTreeMap<T, Vec<T>> = BTreeMap::new();
        for item in self.parent.keys() {
            if let Some(root) = self.find(item) {
                groups.entry(root.clone()).or_default().push(item.clone());
            }
        }
        for members in groups.values_mut() {
            members.sort();
        }
        groups
    }
}

impl<T> Default for UnionFind<T>
where
    T: Clone + Eq + Hash + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_connects_and_smaller_root_wins() {
        let mut uf = UnionFind::new();
        assert!(uf.union("c", "b"));
        assert!(uf.union("b", "a"));
        assert_eq!(uf.find(&"c"), Some(&"a"));
        assert!(uf.connected(&"a", &"c"));
        assert_eq!(uf.count(), 1);
    }

    #[test]
    fn redundant_union_is_a_noop() {
        let mut uf = UnionFind::new();
        uf.union(1, 2);
        uf.union(2, 3);
        assert!(!uf.union(1, 3));
        assert_eq!(uf.count(), 1);
        assert_eq!(uf.len(), 3);
    }

    #[test]
    fn find_is_idempotent() {
        let mut uf = UnionFind::new();
        uf.union(4, 9);
        uf.union(9, 7);
        let root = *uf.find(&7).unwrap();
        assert_eq!(uf.find(&root), Some(&root));
        assert_eq!(root, 4);
    }

    #[test]
    fn unknown_elements() {
        let mut uf: UnionFind<u32> = UnionFind::new();
        assert_eq!(uf.find(&1), None);
        assert!(!uf.connected(&1, &1));
        uf.insert(1);
        assert!(uf.connected(&1, &1));
        assert!(!uf.insert(1));
    }

    #[test]
    fn groups_partition_elements() {
        let mut uf = UnionFind::new();
        uf.union('a', 'b');
        uf.union('x', 'y');
        uf.union('y', 'z');
        uf.insert('q');
        let groups = uf.groups();
        assert_eq!(uf.count(), 3);
        assert_eq!(groups[&'a'], vec!['a', 'b']);
        assert_eq!(groups[&'x'], vec!['x', 'y', 'z']);
        assert_eq!(groups[&'q'], vec!['q']);
    }
}
