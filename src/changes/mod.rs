//! Change descriptions delivered to observers.
//!
//! Producers describe what happened instead of re-sending whole values:
//! - [`ValueChange`] for single values (old and new)
//! - [`ArrayChange`] for ordered sequences, as a batch of
//!   [`ArrayModification`]s applied left to right

mod array;
mod value;

pub use array::{ArrayChange, ArrayModification};
pub use value::ValueChange;
