//! Ordered sequence with caller-supplied comparators
//!
//! `SortedList` is a plain growable sequence that only becomes searchable
//! after an explicit [`SortedList::sort_by`]. Appending, inserting or merging
//! drops the sorted state again, and every search on an unsorted (or empty)
//! list reports "not found".
//!
//! The search comparator may differ in shape from the sort comparator,
//! e.g. "is this address inside the entry's range" versus "order entries by
//! network address", as long as both agree on relative ordering.
//!
//! ```
//! use ipenrich::sorted_list::SortedList;
//!
//! let mut list: SortedList<u32> = [30, 10, 20].into_iter().collect();
//! list.sort_by(|a, b| a.cmp(b));
//! assert_eq!(list.search(&20, |key, entry| key.cmp(entry)), Some(&20));
//! assert_eq!(list.search(&25, |key, entry| key.cmp(entry)), None);
//! ```

use std::cmp::Ordering;

/// Initial capacity for new lists
const DEFAULT_CAPACITY: usize = 16;

/// A growable sequence supporting sort, binary search, dedupe and merge
#[derive(Debug, Clone)]
pub struct SortedList<T> {
    items: Vec<T>,
    sorted: bool,
}

impl<T> Default for SortedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SortedList<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(DEFAULT_CAPACITY),
            sorted: false,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the list holds no entries
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True once `sort_by` has run and nothing was added since
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Entry at `idx`, if any
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx)
    }

    /// Iterate entries in their current order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Entries as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Append an entry. The list is unsorted afterwards.
    pub fn append(&mut self, entry: T) {
        self.items.push(entry);
        self.sorted = false;
    }

    /// Insert an entry at `idx` (clamped to the list length).
    pub fn insert(&mut self, idx: usize, entry: T) {
        let idx = idx.min(self.items.len());
        self.items.insert(idx, entry);
        self.sorted = false;
    }

    /// Remove the entry at `idx` by swapping in the last entry.
    ///
    /// Order is not preserved, so the list is unsorted afterwards.
    pub fn remove(&mut self, idx: usize) -> Option<T> {
        if idx >= self.items.len() {
            return None;
        }
        let removed = self.items.swap_remove(idx);
        if idx < self.items.len() {
            self.sorted = false;
        }
        Some(removed)
    }

    /// Remove the entry at `idx`, shifting the tail down.
    pub fn remove_keep_order(&mut self, idx: usize) -> Option<T> {
        if idx >= self.items.len() {
            return None;
        }
        Some(self.items.remove(idx))
    }

    /// Sort with a total order. Stability is not guaranteed.
    pub fn sort_by<F>(&mut self, cmp: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items.sort_unstable_by(cmp);
        self.sorted = true;
    }

    /// Binary search for the entry where `cmp(key, entry) == Equal`.
    pub fn search<K, F>(&self, key: &K, cmp: F) -> Option<&T>
    where
        K: ?Sized,
        F: Fn(&K, &T) -> Ordering,
    {
        match self.search_index(key, cmp) {
            Ok(idx) => self.items.get(idx),
            Err(_) => None,
        }
    }

    /// Binary search returning the matching index, or the insertion point.
    ///
    /// `cmp(key, entry)` returns `Less` when the key sorts before the entry.
    /// An unsorted list always yields `Err(0)`.
    pub fn search_index<K, F>(&self, key: &K, cmp: F) -> Result<usize, usize>
    where
        K: ?Sized,
        F: Fn(&K, &T) -> Ordering,
    {
        if !self.sorted || self.items.is_empty() {
            return Err(0);
        }

        // Invariants: items[..lo] < key, items[hi..] > key
        let mut lo = 0usize;
        let mut hi = self.items.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match cmp(key, &self.items[mid]) {
                Ordering::Equal => return Ok(mid),
                Ordering::Greater => lo = mid + 1,
                Ordering::Less => hi = mid,
            }
        }
        Err(lo)
    }

    /// Count adjacent entries that `cmp` considers equal.
    pub fn count_duplicates<F>(&self, mut cmp: F) -> usize
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items
            .windows(2)
            .filter(|pair| cmp(&pair[0], &pair[1]) == Ordering::Equal)
            .count()
    }

    /// Collapse adjacent equal entries, keeping the first of each run.
    ///
    /// Must be called after `sort_by` with the same comparator. Every
    /// discarded entry is handed to `release`. Returns the number removed.
    pub fn dedupe<F, R>(&mut self, mut cmp: F, mut release: R) -> usize
    where
        F: FnMut(&T, &T) -> Ordering,
        R: FnMut(T),
    {
        if self.items.len() < 2 {
            return 0;
        }

        let old = std::mem::take(&mut self.items);
        let mut kept: Vec<T> = Vec::with_capacity(old.len());
        let mut removed = 0;

        for entry in old {
            match kept.last() {
                Some(last) if cmp(last, &entry) == Ordering::Equal => {
                    release(entry);
                    removed += 1;
                }
                _ => kept.push(entry),
            }
        }

        self.items = kept;
        removed
    }

    /// Move every entry of `other` to the end of this list.
    ///
    /// `other` is left empty. Nothing is re-sorted.
    pub fn merge(&mut self, other: &mut SortedList<T>) {
        if other.items.is_empty() {
            return;
        }
        self.items.append(&mut other.items);
        other.sorted = false;
        self.sorted = false;
    }

    /// Drop every entry, handing each to `release` first.
    pub fn wipe<R>(&mut self, release: R)
    where
        R: FnMut(T),
    {
        self.items.drain(..).for_each(release);
        self.sorted = false;
    }
}

impl<T> FromIterator<T> for SortedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            sorted: false,
        }
    }
}

impl<T> IntoIterator for SortedList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a SortedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sorted(values: &[u32]) -> SortedList<u32> {
        let mut list: SortedList<u32> = values.iter().copied().collect();
        list.sort_by(|a, b| a.cmp(b));
        list
    }

    #[test]
    fn test_empty_search() {
        let mut list: SortedList<u32> = SortedList::new();
        list.sort_by(|a, b| a.cmp(b));
        assert_eq!(list.search(&1, |k, e| k.cmp(e)), None);
        assert_eq!(list.search_index(&1, |k, e| k.cmp(e)), Err(0));
    }

    #[test]
    fn test_unsorted_search_is_not_found() {
        let mut list = SortedList::new();
        list.append(5u32);
        list.append(1);
        assert!(!list.is_sorted());
        assert_eq!(list.search(&5, |k, e| k.cmp(e)), None);
    }

    #[test]
    fn test_append_clears_sorted() {
        let mut list = sorted(&[1, 2, 3]);
        assert!(list.is_sorted());
        list.append(0);
        assert!(!list.is_sorted());
    }

    #[test]
    fn test_search_index_insertion_point() {
        let list = sorted(&[10, 20, 30]);
        assert_eq!(list.search_index(&20, |k, e| k.cmp(e)), Ok(1));
        assert_eq!(list.search_index(&5, |k, e| k.cmp(e)), Err(0));
        assert_eq!(list.search_index(&25, |k, e| k.cmp(e)), Err(2));
        assert_eq!(list.search_index(&35, |k, e| k.cmp(e)), Err(3));
    }

    #[test]
    fn test_range_search() {
        // (start, end) ranges searched by containment
        let mut list: SortedList<(u32, u32)> =
            vec![(100, 199), (0, 49), (50, 99)].into_iter().collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));

        let contains = |key: &u32, r: &(u32, u32)| {
            if *key < r.0 {
                Ordering::Less
            } else if *key > r.1 {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        };
        assert_eq!(list.search(&75, contains), Some(&(50, 99)));
        assert_eq!(list.search(&0, contains), Some(&(0, 49)));
        assert_eq!(list.search(&250, contains), None);
    }

    #[test]
    fn test_dedupe_releases_discarded() {
        let mut list = sorted(&[3, 1, 2, 3, 1, 3]);
        let mut released = Vec::new();
        let removed = list.dedupe(|a, b| a.cmp(b), |v| released.push(v));
        assert_eq!(removed, 3);
        assert_eq!(list.as_slice(), &[1, 2, 3]);
        assert_eq!(released, vec![1, 3, 3]);
        assert!(list.is_sorted());
    }

    #[test]
    fn test_count_duplicates() {
        let list = sorted(&[4, 4, 4, 7]);
        assert_eq!(list.count_duplicates(|a, b| a.cmp(b)), 2);
    }

    #[test]
    fn test_merge_empties_other() {
        let mut a = sorted(&[1, 5]);
        let mut b = sorted(&[3]);
        a.merge(&mut b);
        assert!(b.is_empty());
        assert_eq!(a.len(), 3);
        assert!(!a.is_sorted());
        a.sort_by(|x, y| x.cmp(y));
        assert_eq!(a.as_slice(), &[1, 3, 5]);
    }

    #[test]
    fn test_remove_variants() {
        let mut list = sorted(&[1, 2, 3, 4]);
        assert_eq!(list.remove_keep_order(1), Some(2));
        assert_eq!(list.as_slice(), &[1, 3, 4]);
        assert!(list.is_sorted());

        assert_eq!(list.remove(0), Some(1));
        assert_eq!(list.len(), 2);
        assert!(!list.is_sorted());
        assert_eq!(list.remove(10), None);
    }

    #[test]
    fn test_insert_clamps() {
        let mut list = sorted(&[1, 2]);
        list.insert(99, 3);
        assert_eq!(list.as_slice(), &[1, 2, 3]);
        list.insert(0, 0);
        assert_eq!(list.get(0), Some(&0));
    }

    #[test]
    fn test_wipe() {
        let mut list = sorted(&[1, 2, 3]);
        let mut count = 0;
        list.wipe(|_| count += 1);
        assert_eq!(count, 3);
        assert!(list.is_empty());
    }

    proptest! {
        #[test]
        fn prop_search_finds_every_entry(values in proptest::collection::vec(any::<u32>(), 0..200)) {
            let list = sorted(&values);
            for v in &values {
                prop_assert_eq!(list.search(v, |k, e| k.cmp(e)), Some(v));
            }
        }

        #[test]
        fn prop_dedupe_is_idempotent(values in proptest::collection::vec(0u32..50, 0..200)) {
            let mut list = sorted(&values);
            list.dedupe(|a, b| a.cmp(b), drop);
            let second = list.dedupe(|a, b| a.cmp(b), drop);
            prop_assert_eq!(second, 0);
            prop_assert_eq!(list.count_duplicates(|a, b| a.cmp(b)), 0);
        }
    }
}
