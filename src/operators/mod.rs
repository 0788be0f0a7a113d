//! Derived observables.
//!
//! Operators are usually built through the extension traits:
//!
//! ```
//! use ripple::{ArrayVariable, ObservableArray, ObservableArrayExt};
//!
//! let numbers = ArrayVariable::new(vec![1, 2, 3]);
//! let tens = numbers.clone().buffered_map(|x| x * 10);
//! numbers.push(4);
//! assert_eq!(tens.value(), vec![10, 20, 30, 40]);
//! ```

mod array_map;
mod buffered_map;
mod count;
mod field;
mod filter;
mod value_map;

pub use array_map::MappedArray;
pub use buffered_map::BufferedMappedArray;
pub use count::ArrayCount;
pub use field::{FieldValue, UpdatableFieldValue};
pub use filter::FilteredArray;
pub use value_map::MappedValue;

use crate::observable::{ObservableArray, ObservableValue, UpdatableValue};

/// Operator constructors for observable values.
pub trait ObservableValueExt: ObservableValue + Sized {
    /// An observable of `transform` of this value.
    fn map<U, F>(self, transform: F) -> MappedValue<Self, U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&Self::Value) -> U + Send + Sync + 'static,
    {
        MappedValue::new(self, transform)
    }

    /// An observable of the field `key` selects from this value.
    fn select<O, K>(self, key: K) -> FieldValue<Self, O>
    where
        O: ObservableValue,
        K: Fn(&Self::Value) -> O + Send + Sync + 'static,
    {
        FieldValue::new(self, key)
    }

    /// Like [`select`](ObservableValueExt::select), but writes go to the
    /// selected field.
    fn select_updatable<O, K>(self, key: K) -> UpdatableFieldValue<Self, O>
    where
        O: UpdatableValue,
        K: Fn(&Self::Value) -> O + Send + Sync + 'static,
    {
        UpdatableFieldValue::new(self, key)
    }
}

impl<T: ObservableValue> ObservableValueExt for T {}

/// Operator constructors for observable arrays.
pub trait ObservableArrayExt: ObservableArray + Sized {
    /// An unbuffered array of `transform` of each element.
    fn map<U, F>(self, transform: F) -> MappedArray<Self, U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&Self::Element) -> U + Send + Sync + 'static,
    {
        MappedArray::new(self, transform)
    }

    /// An array caching `transform` of each element.
    fn buffered_map<U, F>(self, transform: F) -> BufferedMappedArray<Self::Element, U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&Self::Element) -> U + Send + Sync + 'static,
    {
        BufferedMappedArray::new(&self, transform)
    }

    /// The elements whose `test` observable is currently `true`.
    fn filter<B, F>(self, test: F) -> FilteredArray<Self, B>
    where
        B: ObservableValue<Value = bool>,
        F: Fn(&Self::Element) -> B + Send + Sync + 'static,
    {
        FilteredArray::new(self, test)
    }

    /// The element count as an observable value.
    fn observable_count(self) -> ArrayCount<Self> {
        ArrayCount::new(self)
    }
}

impl<T: ObservableArray> ObservableArrayExt for T {}
