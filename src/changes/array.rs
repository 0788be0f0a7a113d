//! Ordered-sequence changes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::slice;

/// A single edit of an ordered sequence.
///
/// Every variant carries the elements it removes as well as the ones it
/// inserts, so a change can be re-expressed (mapped, filtered) without going
/// back to the source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArrayModification<T> {
    /// Insert `element` so that it ends up at `index`.
    Insert { index: usize, element: T },

    /// Remove `element`, currently at `index`.
    Remove { index: usize, element: T },

    /// Replace `old` at `index` with `new`.
    Replace { index: usize, old: T, new: T },

    /// Replace the contiguous run `old` starting at `index` with `new`.
    ReplaceSlice { index: usize, old: Vec<T>, new: Vec<T> },
}

impl<T> ArrayModification<T> {
    /// Build the most specific modification replacing `old` with `new` at `index`.
    ///
    /// Returns `None` when both runs are empty.
    pub fn from_parts(index: usize, mut old: Vec<T>, mut new: Vec<T>) -> Option<Self> {
        match (old.len(), new.len()) {
            (0, 0) => None,
            (0, 1) => new.pop().map(|element| Self::Insert { index, element }),
            (1, 0) => old.pop().map(|element| Self::Remove { index, element }),
            (1, 1) => match (old.pop(), new.pop()) {
                (Some(old), Some(new)) => Some(Self::Replace { index, old, new }),
                _ => None,
            },
            _ => Some(Self::ReplaceSlice { index, old, new }),
        }
    }

    /// Position of the edit.
    pub fn index(&self) -> usize {
        match self {
            Self::Insert { index, .. }
            | Self::Remove { index, .. }
            | Self::Replace { index, .. }
            | Self::ReplaceSlice { index, .. } => *index,
        }
    }

    /// Elements removed by this edit, in order.
    pub fn old_elements(&self) -> &[T] {
        match self {
            Self::Insert { .. } => &[],
            Self::Remove { element, .. } => slice::from_ref(element),
            Self::Replace { old, .. } => slice::from_ref(old),
            Self::ReplaceSlice { old, .. } => old,
        }
    }

    /// Elements inserted by this edit, in order.
    pub fn new_elements(&self) -> &[T] {
        match self {
            Self::Insert { element, .. } => slice::from_ref(element),
            Self::Remove { .. } => &[],
            Self::Replace { new, .. } => slice::from_ref(new),
            Self::ReplaceSlice { new, .. } => new,
        }
    }

    /// Range of the sequence affected, before the edit is applied.
    pub fn input_range(&self) -> Range<usize> {
        let index = self.index();
        index..index + self.old_elements().len()
    }

    /// Range of the sequence affected, after the edit is applied.
    pub fn output_range(&self) -> Range<usize> {
        let index = self.index();
        index..index + self.new_elements().len()
    }

    /// How much the sequence grows (or shrinks) by this edit.
    pub fn delta_count(&self) -> isize {
        self.new_elements().len() as isize - self.old_elements().len() as isize
    }

    /// Transform every element carried by the edit.
    pub fn map<U>(&self, mut transform: impl FnMut(&T) -> U) -> ArrayModification<U> {
        match self {
            Self::Insert { index, element } => ArrayModification::Insert {
                index: *index,
                element: transform(element),
            },
            Self::Remove { index, element } => ArrayModification::Remove {
                index: *index,
                element: transform(element),
            },
            Self::Replace { index, old, new } => ArrayModification::Replace {
                index: *index,
                old: transform(old),
                new: transform(new),
            },
            Self::ReplaceSlice { index, old, new } => ArrayModification::ReplaceSlice {
                index: *index,
                old: old.iter().map(&mut transform).collect(),
                new: new.iter().map(&mut transform).collect(),
            },
        }
    }

    /// Check that the edit addresses a sequence of `count` elements.
    fn validate(&self, count: usize) -> Result<()> {
        let range = self.input_range();
        if range.end > count {
            let index = if range.is_empty() {
                range.start
            } else {
                range.end - 1
            };
            return Err(Error::IndexOutOfBounds { index, count });
        }
        Ok(())
    }
}

impl<T: Clone> ArrayModification<T> {
    /// Perform the edit on `target`.
    pub fn apply(&self, target: &mut Vec<T>) -> Result<()> {
        self.validate(target.len())?;
        match self {
            Self::Insert { index, element } => target.insert(*index, element.clone()),
            Self::Remove { index, .. } => {
                target.remove(*index);
            }
            Self::Replace { index, new, .. } => target[*index] = new.clone(),
            Self::ReplaceSlice { index, old, new } => {
                target.splice(*index..*index + old.len(), new.iter().cloned());
            }
        }
        Ok(())
    }
}

/// A batch of edits to an ordered sequence.
///
/// Modifications are applied left to right; each one is expressed against the
/// sequence as left by the previous ones, starting from `initial_count`
/// elements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayChange<T> {
    initial_count: usize,
    modifications: Vec<ArrayModification<T>>,
}

impl<T> ArrayChange<T> {
    /// An empty change of a sequence with `initial_count` elements.
    pub fn new(initial_count: usize) -> Self {
        Self {
            initial_count,
            modifications: Vec::new(),
        }
    }

    /// A change consisting of a single edit.
    ///
    /// # Panics
    ///
    /// Panics if `modification` does not fit a sequence of `initial_count`
    /// elements.
    pub fn with_modification(initial_count: usize, modification: ArrayModification<T>) -> Self {
        let mut change = Self::new(initial_count);
        if let Err(err) = change.add(modification) {
            panic!("invalid modification: {err}");
        }
        change
    }

    /// Number of elements before the change.
    pub fn initial_count(&self) -> usize {
        self.initial_count
    }

    /// Number of elements after the change.
    pub fn final_count(&self) -> usize {
        (self.initial_count as isize + self.delta_count()) as usize
    }

    /// Net growth of the sequence.
    pub fn delta_count(&self) -> isize {
        self.modifications.iter().map(ArrayModification::delta_count).sum()
    }

    /// True if the change carries no edits.
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    pub fn modifications(&self) -> &[ArrayModification<T>] {
        &self.modifications
    }

    pub fn into_modifications(self) -> Vec<ArrayModification<T>> {
        self.modifications
    }

    /// Append an edit, expressed against the sequence as left by the edits
    /// already in this change.
    ///
    /// A slice replacement that neither removes nor inserts anything is
    /// dropped.
    pub fn add(&mut self, modification: ArrayModification<T>) -> Result<()> {
        modification.validate(self.final_count())?;
        self.push(modification);
        Ok(())
    }

    /// Append an edit the caller knows to be valid.
    pub(crate) fn push(&mut self, modification: ArrayModification<T>) {
        debug_assert!(
            modification.validate(self.final_count()).is_ok(),
            "modification out of range"
        );
        if let ArrayModification::ReplaceSlice { old, new, .. } = &modification {
            if old.is_empty() && new.is_empty() {
                return;
            }
        }
        self.modifications.push(modification);
    }

    /// Compose this change with one that follows it.
    pub fn merge(mut self, next: ArrayChange<T>) -> Result<Self> {
        if next.initial_count != self.final_count() {
            return Err(Error::IncompatibleChanges {
                final_count: self.final_count(),
                initial_count: next.initial_count,
            });
        }
        self.modifications.extend(next.modifications);
        Ok(self)
    }

    /// Transform every element carried by the change.
    pub fn map<U>(&self, mut transform: impl FnMut(&T) -> U) -> ArrayChange<U> {
        ArrayChange {
            initial_count: self.initial_count,
            modifications: self
                .modifications
                .iter()
                .map(|m| m.map(&mut transform))
                .collect(),
        }
    }
}

impl<T: Clone> ArrayChange<T> {
    /// Perform every edit on `target`, in order.
    ///
    /// Fails without touching `target` if its length is not the change's
    /// initial count. An out-of-range edit stops the application at that edit.
    pub fn apply(&self, target: &mut Vec<T>) -> Result<()> {
        if target.len() != self.initial_count {
            return Err(Error::CountMismatch {
                expected: self.initial_count,
                actual: target.len(),
            });
        }
        for modification in &self.modifications {
            modification.apply(target)?;
        }
        Ok(())
    }
}
