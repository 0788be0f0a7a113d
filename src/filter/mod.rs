//! Incremental filtering machinery.
//!
//! [`FilterIndex`] keeps the positions of the elements passing a predicate
//! in sync with a changing sequence; [`ElementConnections`] keeps one
//! connection per element aligned with it, so per-element observables can
//! report which element they belong to.

mod index;
mod table;

pub use index::FilterIndex;
pub use table::{ElementConnections, SlotId};
