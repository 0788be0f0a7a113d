//! Simple old/new value changes.

use serde::{Deserialize, Serialize};

/// A value went from `old` to `new`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueChange<T> {
    pub old: T,
    pub new: T,
}

impl<T> ValueChange<T> {
    pub fn new(old: T, new: T) -> Self {
        Self { old, new }
    }

    /// Transform both sides of the change.
    pub fn map<U>(&self, mut transform: impl FnMut(&T) -> U) -> ValueChange<U> {
        ValueChange {
            old: transform(&self.old),
            new: transform(&self.new),
        }
    }

    /// Compose with a change that follows this one.
    pub fn merge(self, next: ValueChange<T>) -> Self {
        Self {
            old: self.old,
            new: next.new,
        }
    }

    /// The change that undoes this one.
    pub fn reversed(self) -> Self {
        Self {
            old: self.new,
            new: self.old,
        }
    }
}

impl<T: PartialEq> ValueChange<T> {
    /// True if the value did not actually change.
    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}
