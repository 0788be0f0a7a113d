//! Error types for change validation.

use thiserror::Error;

/// Errors reported when a change does not fit the sequence it is applied to.
///
/// Operators treat these situations as contract violations and panic; the
/// checked entry points (`ArrayChange::apply`, `ArrayChange::add`,
/// `ArrayChange::merge`, `ArrayVariable::apply`) report them instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Count mismatch: change expects {expected} elements, sequence has {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Index {index} out of bounds (count {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("Incompatible changes: first ends with {final_count} elements, second starts with {initial_count}")]
    IncompatibleChanges {
        final_count: usize,
        initial_count: usize,
    },
}

/// Result type for change validation.
pub type Result<T> = std::result::Result<T, Error>;
