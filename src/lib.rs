//! # Ripple
//!
//! Incremental change propagation for observable values and arrays.
//!
//! Mutable state is observed through change streams; derived views (mapped,
//! filtered, buffered, field-chained) consume those streams and forward
//! precise descriptions of what changed instead of re-reading whole values.
//!
//! ## Core Concepts
//!
//! - **Connections**: subscription handles with exactly-once teardown
//! - **Signals**: multicast channels activated by their first subscriber
//! - **Changes**: [`ValueChange`] and [`ArrayChange`] describe edits
//! - **Filter index**: keeps the positions passing a predicate in sync
//! - **Operators**: derived observables built on the above
//!
//! ## Example
//!
//! ```
//! use ripple::{ArrayVariable, Constant, ObservableArray, ObservableArrayExt};
//!
//! let numbers = ArrayVariable::new(vec![1, 2, 3, 4]);
//! let evens = numbers.clone().filter(|x: &i32| Constant::new(x % 2 == 0));
//! assert_eq!(evens.value(), vec![2, 4]);
//!
//! let connection = evens.changes().connect(|change| {
//!     println!("evens changed: {change:?}");
//! });
//! numbers.replace(0, 6);
//! assert_eq!(evens.value(), vec![6, 2, 4]);
//! connection.disconnect();
//! ```

pub mod changes;
pub mod error;
pub mod filter;
pub mod observable;
pub mod operators;
pub mod signal;

// Re-exports
pub use changes::{ArrayChange, ArrayModification, ValueChange};
pub use error::{Error, Result};
pub use filter::{ElementConnections, FilterIndex, SlotId};
pub use observable::{
    ArrayVariable, Constant, ObservableArray, ObservableValue, UpdatableValue, Variable,
};
pub use operators::{
    ArrayCount, BufferedMappedArray, FieldValue, FilteredArray, MappedArray, MappedValue,
    ObservableArrayExt, ObservableValueExt, UpdatableFieldValue,
};
pub use signal::{Connection, ConnectionId, SendGuard, Signal, SignalDelegate, Sink, Source};
