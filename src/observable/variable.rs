//! Single-value observables.

use super::{ObservableValue, UpdatableValue};
use crate::changes::ValueChange;
use crate::signal::{Signal, Source};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

struct VariableInner<T> {
    value: Mutex<T>,
    signal: Signal<ValueChange<T>>,
}

/// A mutable, observable value.
///
/// Clones share the same value.
pub struct Variable<T> {
    inner: Arc<VariableInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Variable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(VariableInner {
                value: Mutex::new(value),
                signal: Signal::new(),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Replace the value and notify observers, returning the old value.
    pub fn set(&self, value: T) -> T {
        let _sends = self.inner.signal.lock_sends();
        let old = std::mem::replace(&mut *self.inner.value.lock(), value.clone());
        self.inner.signal.send(ValueChange::new(old.clone(), value));
        old
    }

    /// Number of sinks currently observing the value.
    pub fn subscriber_count(&self) -> usize {
        self.inner.signal.subscriber_count()
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableValue for Variable<T> {
    type Value = T;

    fn value(&self) -> T {
        self.get()
    }

    fn changes(&self) -> Source<ValueChange<T>> {
        self.inner.signal.source()
    }
}

impl<T: Clone + Send + Sync + 'static> UpdatableValue for Variable<T> {
    fn set_value(&self, value: T) {
        self.set(value);
    }
}

impl<T> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Variable").field(&*self.inner.value.lock()).finish()
    }
}

/// A value that never changes.
#[derive(Clone, Debug)]
pub struct Constant<T>(T);

impl<T> Constant<T> {
    pub fn new(value: T) -> Self {
        Constant(value)
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableValue for Constant<T> {
    type Value = T;

    fn value(&self) -> T {
        self.0.clone()
    }

    fn changes(&self) -> Source<ValueChange<T>> {
        Source::empty()
    }
}
