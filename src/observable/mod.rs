//! Observable interfaces and reference implementations.
//!
//! Operators only rely on the traits defined here. [`Variable`],
//! [`ArrayVariable`] and [`Constant`] are minimal in-memory implementations.

mod array_variable;
mod variable;

pub use array_variable::ArrayVariable;
pub use variable::{Constant, Variable};

use crate::changes::{ArrayChange, ValueChange};
use crate::signal::Source;
use std::ops::Range;

/// A value that can be read and whose changes can be observed.
pub trait ObservableValue: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;

    /// The current value.
    fn value(&self) -> Self::Value;

    /// Changes of the value, as old/new pairs.
    fn changes(&self) -> Source<ValueChange<Self::Value>>;
}

/// An observable value that can also be written.
///
/// Writing is expected to emit a change through [`ObservableValue::changes`].
pub trait UpdatableValue: ObservableValue {
    fn set_value(&self, value: Self::Value);
}

/// An ordered collection whose edits can be observed.
///
/// Every change emitted through [`ObservableArray::changes`] has an
/// `initial_count` equal to the count right before the change.
pub trait ObservableArray: Send + Sync + 'static {
    type Element: Clone + Send + Sync + 'static;

    fn count(&self) -> usize;

    /// The element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    fn get(&self, index: usize) -> Self::Element;

    /// The elements in `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds.
    fn slice(&self, range: Range<usize>) -> Vec<Self::Element> {
        assert_range(&range, self.count());
        range.map(|index| self.get(index)).collect()
    }

    /// All elements.
    fn value(&self) -> Vec<Self::Element> {
        self.slice(0..self.count())
    }

    fn changes(&self) -> Source<ArrayChange<Self::Element>>;

    /// True if the array keeps its own copy of the elements.
    fn is_buffered(&self) -> bool {
        false
    }
}

pub(crate) fn assert_index(index: usize, count: usize) {
    assert!(index < count, "index {index} out of bounds (count {count})");
}

pub(crate) fn assert_range(range: &Range<usize>, count: usize) {
    assert!(
        range.start <= range.end && range.end <= count,
        "range {range:?} out of bounds (count {count})"
    );
}
