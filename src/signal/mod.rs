//! Delivery primitives.
//!
//! - [`Connection`]: a subscription handle with exactly-once teardown
//! - [`Signal`]: a lazily activated multicast channel
//! - [`Source`]: the type-erased thing observers connect to
//!
//! # Example
//!
//! ```
//! use ripple::Signal;
//!
//! let signal = Signal::new();
//! let connection = signal.source().connect(|value: &i32| println!("got {value}"));
//! signal.send(42);
//! connection.disconnect();
//! ```

mod connection;
mod multicast;
mod source;

pub use connection::{Connection, ConnectionId};
pub use multicast::{SendGuard, Signal, SignalDelegate};
pub use source::{Sink, Source};
