//! Incremental predicate index over an ordered sequence.

use crate::changes::{ArrayChange, ArrayModification};
use std::fmt;

type Test<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Tracks which positions of a sequence satisfy a predicate.
///
/// `matching_indices` is kept strictly increasing and always equals the set
/// of source indices whose element passes the test. Source-level changes are
/// folded in with [`FilterIndex::apply`], which also re-expresses them as
/// changes of the filtered subsequence. Elements whose test result flips
/// without a structural edit are reported through [`FilterIndex::insert`] and
/// [`FilterIndex::remove`].
pub struct FilterIndex<T> {
    test: Test<T>,
    matching: Vec<usize>,
}

impl<T: Clone> FilterIndex<T> {
    pub fn new(initial: &[T], test: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        let matching = initial
            .iter()
            .enumerate()
            .filter(|(_, element)| test(element))
            .map(|(index, _)| index)
            .collect();
        Self {
            test: Box::new(test),
            matching,
        }
    }

    /// Source indices of the matching elements, in source order.
    pub fn matching_indices(&self) -> &[usize] {
        &self.matching
    }

    /// Number of matching elements.
    pub fn count(&self) -> usize {
        self.matching.len()
    }

    /// Source index of the element at `filtered_index`.
    ///
    /// # Panics
    ///
    /// Panics if `filtered_index` is out of bounds.
    pub fn source_index(&self, filtered_index: usize) -> usize {
        self.matching[filtered_index]
    }

    /// Fold a source change into the index and return the equivalent change
    /// of the filtered subsequence.
    ///
    /// The returned change is empty when no element entered or left the
    /// filtered subsequence.
    pub fn apply(&mut self, change: &ArrayChange<T>) -> ArrayChange<T> {
        let mut filtered = ArrayChange::new(self.matching.len());
        for modification in change.modifications() {
            let start = modification.index();
            let old = modification.old_elements();
            let new = modification.new_elements();

            // Filtered range covering the edited source range.
            let lo = self.matching.partition_point(|&i| i < start);
            let hi = self.matching.partition_point(|&i| i < start + old.len());

            let removed: Vec<T> = self.matching[lo..hi]
                .iter()
                .map(|&i| old[i - start].clone())
                .collect();

            let mut added_indices = Vec::new();
            let mut added = Vec::new();
            for (offset, element) in new.iter().enumerate() {
                if (self.test)(element) {
                    added_indices.push(start + offset);
                    added.push(element.clone());
                }
            }

            let delta = modification.delta_count();
            if delta != 0 {
                for index in &mut self.matching[hi..] {
                    *index = (*index as isize + delta) as usize;
                }
            }
            self.matching.splice(lo..hi, added_indices);

            if let Some(edit) = ArrayModification::from_parts(lo, removed, added) {
                filtered.push(edit);
            }
        }
        debug_assert!(self.matching.windows(2).all(|w| w[0] < w[1]));
        filtered
    }

    /// Record that the element at `source_index` started matching.
    ///
    /// Returns its filtered index, or `None` if it was already matching.
    pub fn insert(&mut self, source_index: usize) -> Option<usize> {
        match self.matching.binary_search(&source_index) {
            Ok(_) => None,
            Err(position) => {
                self.matching.insert(position, source_index);
                Some(position)
            }
        }
    }

    /// Record that the element at `source_index` stopped matching.
    ///
    /// Returns its former filtered index, or `None` if it was not matching.
    pub fn remove(&mut self, source_index: usize) -> Option<usize> {
        match self.matching.binary_search(&source_index) {
            Ok(position) => {
                self.matching.remove(position);
                Some(position)
            }
            Err(_) => None,
        }
    }
}

impl<T> fmt::Debug for FilterIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterIndex")
            .field("matching", &self.matching)
            .finish_non_exhaustive()
    }
}
