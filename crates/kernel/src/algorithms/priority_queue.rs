use std::fmt;

/// Direction in which a [`PriorityQueue`] keeps its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Lowest score at the front.
    #[default]
    Ascending,
    /// Highest score at the front.
    Descending,
}

/// A sorted vector ranked by a caller-supplied scoring function.
///
/// Insertion is a binary search followed by a shift, so the queue suits the
/// small, frequently re-scanned sets a scheduler deals with. Elements with
/// equal scores keep their insertion order.
pub struct PriorityQueue<T, F>
where
    F: Fn(&T) -> f64,
{
    score: F,
    order: SortOrder,
    /// Elements paired with their score at insertion time.
    items: Vec<(f64, T)>,
}

impl<T, F> PriorityQueue<T, F>
where
    F: Fn(&T) -> f64,
{
    pub fn new(score: F, order: SortOrder) -> Self {
        Self {
            score,
            order,
            items: Vec::new(),
        }
    }

    /// Insert `item` after every element that ranks equal or ahead of it.
    /// Returns the position it landed at.
    pub fn insert(&mut self, item: T) -> usize {
        let rank = (self.score)(&item);
        let order = self.order;
        let at = self.items.partition_point(|(existing, _)| match order {
            SortOrder::Ascending => existing.total_cmp(&rank).is_le(),
            SortOrder::Descending => existing.total_cmp(&rank).is_ge(),
        });
        self.items.insert(at, (rank, item));
        at
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0).1)
        }
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.first().map(|(_, item)| item)
    }

    /// Remove the element at `index`.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index < self.items.len() {
            Some(self.items.remove(index).1)
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index).map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|(_, item)| item)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items.into_iter().map(|(_, item)| item).collect()
    }
}

impl<T, F> Extend<T> for PriorityQueue<T, F>
where
    F: Fn(&T) -> f64,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<T: fmt::Debug, F> fmt::Debug for PriorityQueue<T, F>
where
    F: Fn(&T) -> f64,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("order", &self.order)
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_keeps_lowest_first() {
        let mut q = PriorityQueue::new(|x: &i32| *x as f64, SortOrder::Ascending);
        q.extend([5, 1, 4, 2, 3]);
        assert_eq!(q.into_vec(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn descending_keeps_highest_first() {
        let mut q = PriorityQueue::new(|x: &i32| *x as f64, SortOrder::Descending);
        q.extend([5, 1, 4, 2, 3]);
        assert_eq!(q.pop_front(), Some(5));
        assert_eq!(q.peek(), Some(&4));
        assert_eq!(q.len(), 4);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut q = PriorityQueue::new(|x: &(u32, char)| x.0 as f64, SortOrder::Ascending);
        q.insert((2, 'a'));
        q.insert((1, 'b'));
        q.insert((2, 'c'));
        q.insert((1, 'd'));
        let names: String = q.iter().map(|x| x.1).collect();
        assert_eq!(names, "bdac");

        let mut q = PriorityQueue::new(|x: &(u32, char)| x.0 as f64, SortOrder::Descending);
        q.extend([(1, 'a'), (2, 'b'), (1, 'c'), (2, 'd')]);
        let names: String = q.iter().map(|x| x.1).collect();
        assert_eq!(names, "bdac");
    }

    #[test]
    fn positional_removal() {
        let mut q = PriorityQueue::new(|x: &i32| *x as f64, SortOrder::Ascending);
        q.extend([3, 1, 2]);
        assert_eq!(q.remove(1), Some(2));
        assert_eq!(q.remove(7), None);
        assert_eq!(q.get(1), Some(&3));
    }

    #[test]
    fn every_element_is_at_least_its_predecessor() {
        let mut q = PriorityQueue::new(|x: &f64| *x, SortOrder::Ascending);
        for i in 0..50 {
            q.insert(((i * 37) % 11) as f64 - 5.5);
        }
        let items = q.into_vec();
        assert!(items.windows(2).all(|w| w[0] <= w[1]), "not sorted: {items:?}");
    }

    #[test]
    fn empty_queue() {
        let mut q = PriorityQueue::new(|x: &i32| *x as f64, SortOrder::default());
        assert!(q.is_empty());
        assert_eq!(q.pop_front(), None);
        assert_eq!(q.order(), SortOrder::Ascending);
    }
}
