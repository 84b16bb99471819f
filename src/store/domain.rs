//! Finite integer domains.

/// Outcome of a shrink operation on a [`Domain`].
///
/// Shrinks are monotonic: a domain only ever loses values. `Empty` means
/// the operation removed the last value and the current branch is
/// inconsistent; the domain itself is left untouched in that case so the
/// store never holds an empty domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shrink {
    /// The operation removed nothing.
    Unchanged,
    /// Values were removed but more than one remains.
    Shrunk,
    /// Values were removed and exactly one remains.
    Assigned,
    /// The operation would remove every value.
    Empty,
}

/// The set of admissible values of one decision variable.
///
/// Stored as a sorted vector of distinct values. Mapping problems keep
/// domains small (processors, successor indices, a handful of delay
/// levels), so a flat vector beats interval trees both in clone cost —
/// the search engine clones every domain at each choice point — and in
/// iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    values: Vec<i64>,
}

impl Domain {
    /// Creates the domain `{min, min+1, …, max}`.
    ///
    /// # Panics
    ///
    /// Panics if `min > max`.
    pub fn range(min: i64, max: i64) -> Self {
        assert!(min <= max, "empty initial domain [{min}, {max}]");
        Self {
            values: (min..=max).collect(),
        }
    }

    /// Creates a domain from arbitrary values (sorted and deduplicated).
    ///
    /// # Panics
    ///
    /// Panics if `values` is empty.
    pub fn from_values(mut values: Vec<i64>) -> Self {
        assert!(!values.is_empty(), "empty initial domain");
        values.sort_unstable();
        values.dedup();
        Self { values }
    }

    /// Creates a singleton domain.
    pub fn singleton(value: i64) -> Self {
        Self {
            values: vec![value],
        }
    }

    /// Smallest admissible value.
    pub fn min(&self) -> i64 {
        self.values[0]
    }

    /// Largest admissible value.
    pub fn max(&self) -> i64 {
        *self.values.last().unwrap()
    }

    /// Number of admissible values.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Whether the domain is a singleton.
    pub fn is_assigned(&self) -> bool {
        self.values.len() == 1
    }

    /// The assigned value, if the domain is a singleton.
    pub fn value(&self) -> Option<i64> {
        if self.is_assigned() {
            Some(self.values[0])
        } else {
            None
        }
    }

    /// Whether `v` is admissible.
    pub fn contains(&self, v: i64) -> bool {
        self.values.binary_search(&v).is_ok()
    }

    /// Iterates over admissible values in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.values.iter().copied()
    }

    /// Restricts the domain to the single value `v`.
    pub fn assign(&mut self, v: i64) -> Shrink {
        if !self.contains(v) {
            return Shrink::Empty;
        }
        if self.values.len() == 1 {
            return Shrink::Unchanged;
        }
        self.values.clear();
        self.values.push(v);
        Shrink::Assigned
    }

    /// Removes the value `v`.
    pub fn remove(&mut self, v: i64) -> Shrink {
        match self.values.binary_search(&v) {
            Err(_) => Shrink::Unchanged,
            Ok(_) if self.values.len() == 1 => Shrink::Empty,
            Ok(idx) => {
                self.values.remove(idx);
                self.classify()
            }
        }
    }

    /// Removes every value strictly below `bound`.
    pub fn tighten_min(&mut self, bound: i64) -> Shrink {
        let cut = self.values.partition_point(|&v| v < bound);
        if cut == 0 {
            return Shrink::Unchanged;
        }
        if cut == self.values.len() {
            return Shrink::Empty;
        }
        self.values.drain(..cut);
        self.classify()
    }

    /// Removes every value strictly above `bound`.
    pub fn tighten_max(&mut self, bound: i64) -> Shrink {
        let keep = self.values.partition_point(|&v| v <= bound);
        if keep == self.values.len() {
            return Shrink::Unchanged;
        }
        if keep == 0 {
            return Shrink::Empty;
        }
        self.values.truncate(keep);
        self.classify()
    }

    /// Keeps only values satisfying `pred`.
    pub fn retain(&mut self, pred: impl Fn(i64) -> bool) -> Shrink {
        let before = self.values.len();
        let mut kept: Vec<i64> = self.values.iter().copied().filter(|&v| pred(v)).collect();
        if kept.is_empty() {
            return Shrink::Empty;
        }
        if kept.len() == before {
            return Shrink::Unchanged;
        }
        std::mem::swap(&mut self.values, &mut kept);
        self.classify()
    }

    fn classify(&self) -> Shrink {
        if self.values.len() == 1 {
            Shrink::Assigned
        } else {
            Shrink::Shrunk
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_basics() {
        let d = Domain::range(0, 4);
        assert_eq!(d.min(), 0);
        assert_eq!(d.max(), 4);
        assert_eq!(d.size(), 5);
        assert!(!d.is_assigned());
        assert!(d.contains(2));
        assert!(!d.contains(5));
    }

    #[test]
    fn test_from_values_sorts_and_dedups() {
        let d = Domain::from_values(vec![7, 0, 7, 3]);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![0, 3, 7]);
    }

    #[test]
    fn test_assign() {
        let mut d = Domain::range(0, 3);
        assert_eq!(d.assign(2), Shrink::Assigned);
        assert_eq!(d.value(), Some(2));
        assert_eq!(d.assign(2), Shrink::Unchanged);
        assert_eq!(d.assign(3), Shrink::Empty);
        // domain untouched after a failed shrink
        assert_eq!(d.value(), Some(2));
    }

    #[test]
    fn test_remove_down_to_singleton() {
        let mut d = Domain::from_values(vec![1, 5]);
        assert_eq!(d.remove(3), Shrink::Unchanged);
        assert_eq!(d.remove(5), Shrink::Assigned);
        assert_eq!(d.remove(1), Shrink::Empty);
        assert_eq!(d.value(), Some(1));
    }

    #[test]
    fn test_tighten_bounds() {
        let mut d = Domain::range(0, 9);
        assert_eq!(d.tighten_min(3), Shrink::Shrunk);
        assert_eq!(d.min(), 3);
        assert_eq!(d.tighten_max(4), Shrink::Shrunk);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(d.tighten_min(4), Shrink::Assigned);
        assert_eq!(d.tighten_min(5), Shrink::Empty);
    }

    #[test]
    fn test_retain() {
        let mut d = Domain::range(0, 6);
        assert_eq!(d.retain(|v| v % 2 == 0), Shrink::Shrunk);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![0, 2, 4, 6]);
        assert_eq!(d.retain(|_| false), Shrink::Empty);
        assert_eq!(d.size(), 4);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_domain() -> impl Strategy<Value = Domain> {
        proptest::collection::vec(-50i64..50, 1..12).prop_map(Domain::from_values)
    }

    proptest! {
        #[test]
        fn prop_values_stay_sorted_and_distinct(mut d in arb_domain(), bound in -60i64..60) {
            let _ = d.tighten_min(bound);
            let vals: Vec<i64> = d.iter().collect();
            let mut sorted = vals.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(vals, sorted);
        }

        #[test]
        fn prop_tighten_min_establishes_bound(mut d in arb_domain(), bound in -60i64..60) {
            match d.tighten_min(bound) {
                // failed shrinks leave the domain untouched
                Shrink::Empty => prop_assert!(d.max() < bound),
                _ => prop_assert!(d.min() >= bound),
            }
        }

        #[test]
        fn prop_retain_keeps_exactly_matching(mut d in arb_domain(), m in 2i64..5) {
            let before: Vec<i64> = d.iter().collect();
            let expect: Vec<i64> = before.iter().copied().filter(|v| v % m == 0).collect();
            match d.retain(|v| v % m == 0) {
                Shrink::Empty => prop_assert!(expect.is_empty()),
                _ => prop_assert_eq!(d.iter().collect::<Vec<i64>>(), expect),
            }
        }

        #[test]
        fn prop_remove_is_membership(mut d in arb_domain(), v in -60i64..60) {
            let had = d.contains(v);
            match d.remove(v) {
                Shrink::Empty => prop_assert!(had && d.size() == 1),
                Shrink::Unchanged => prop_assert!(!had),
                _ => prop_assert!(had && !d.contains(v)),
            }
        }
    }
}
