//! Field chaining: observing an observable selected from another one.

use crate::changes::ValueChange;
use crate::observable::{ObservableValue, UpdatableValue};
use crate::signal::{Connection, Signal, SignalDelegate, Source};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Subscription state of a field observable.
enum FieldState<V> {
    Unsubscribed,
    Subscribed {
        /// Cached value of the currently selected field.
        current: V,
        /// Token of the current field subscription; callbacks carrying any
        /// other token belong to a field that was switched away from.
        epoch: u64,
        parent_connection: Connection,
        field_connection: Connection,
    },
}

struct FieldInner<P: ObservableValue, F: ObservableValue> {
    parent: P,
    key: Arc<dyn Fn(&P::Value) -> F + Send + Sync>,
    signal: Signal<ValueChange<F::Value>>,
    state: Mutex<FieldState<F::Value>>,
    epoch: AtomicU64,
    this: Weak<Self>,
}

impl<P: ObservableValue, F: ObservableValue> FieldInner<P, F> {
    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn connect_field(&self, field: &F, epoch: u64) -> Connection {
        let this = self.this.clone();
        field.changes().connect(move |change| {
            if let Some(inner) = this.upgrade() {
                inner.field_changed(epoch, change);
            }
        })
    }

    fn parent_changed(&self, change: &ValueChange<P::Value>) {
        let _sends = self.signal.lock_sends();
        let field = (self.key)(&change.new);
        let switched = {
            let mut state = self.state.lock();
            match &mut *state {
                FieldState::Unsubscribed => None,
                FieldState::Subscribed {
                    current,
                    epoch: current_epoch,
                    field_connection: current_connection,
                    ..
                } => {
                    // Subscribe to the new field before letting go of the old
                    // one; its changes wait on the lock until the epoch is in
                    // place.
                    let epoch = self.next_epoch();
                    let field_connection = self.connect_field(&field, epoch);
                    let new = field.value();
                    *current_epoch = epoch;
                    let old = std::mem::replace(current, new.clone());
                    let stale = std::mem::replace(current_connection, field_connection);
                    Some((ValueChange::new(old, new), stale, epoch))
                }
            }
        };

        match switched {
            Some((change, stale, epoch)) => {
                drop(stale);
                debug!(epoch, "selected field switched");
                self.signal.send(change);
            }
            None => trace!("parent change ignored while unsubscribed"),
        }
    }

    fn field_changed(&self, epoch: u64, change: &ValueChange<F::Value>) {
        let _sends = self.signal.lock_sends();
        let forwarded = {
            let mut state = self.state.lock();
            match &mut *state {
                // The old value is the one last reported, which may already
                // include this change if it raced with a switch.
                FieldState::Subscribed {
                    current,
                    epoch: current_epoch,
                    ..
                } if *current_epoch == epoch => {
                    let old = std::mem::replace(current, change.new.clone());
                    ValueChange::new(old, change.new.clone())
                }
                _ => {
                    trace!(epoch, "stale field change ignored");
                    return;
                }
            }
        };
        self.signal.send(forwarded);
    }

    fn value(&self) -> F::Value {
        if let FieldState::Subscribed { current, .. } = &*self.state.lock() {
            return current.clone();
        }
        (self.key)(&self.parent.value()).value()
    }
}

impl<P: ObservableValue, F: ObservableValue> SignalDelegate<ValueChange<F::Value>> for FieldInner<P, F> {
    fn start(&self, _signal: &Signal<ValueChange<F::Value>>) {
        // Upstream changes arriving meanwhile wait on the lock, then find the
        // subscription in place.
        let mut state = self.state.lock();
        let this = self.this.clone();
        let parent_connection = self.parent.changes().connect(move |change| {
            if let Some(inner) = this.upgrade() {
                inner.parent_changed(change);
            }
        });
        let field = (self.key)(&self.parent.value());
        let epoch = self.next_epoch();
        let field_connection = self.connect_field(&field, epoch);
        let current = field.value();

        let previous = std::mem::replace(
            &mut *state,
            FieldState::Subscribed {
                current,
                epoch,
                parent_connection,
                field_connection,
            },
        );
        drop(state);
        debug_assert!(matches!(previous, FieldState::Unsubscribed));
    }

    fn stop(&self, _signal: &Signal<ValueChange<F::Value>>) {
        let previous = std::mem::replace(&mut *self.state.lock(), FieldState::Unsubscribed);
        self.next_epoch();
        // Disconnects parent and field.
        drop(previous);
    }
}

/// An observable tracking a field selected from a parent observable's value.
///
/// `key` maps the parent's value to the field observable. While the field
/// has subscribers it follows both the parent and the current field: a field
/// change is forwarded as is, and a parent change switches to the newly
/// selected field and emits a single change from the old field value to the
/// new one. Without subscribers nothing is connected and reads go through
/// the parent.
pub struct FieldValue<P: ObservableValue, F: ObservableValue> {
    inner: Arc<FieldInner<P, F>>,
}

impl<P: ObservableValue, F: ObservableValue> FieldValue<P, F> {
    pub fn new(parent: P, key: impl Fn(&P::Value) -> F + Send + Sync + 'static) -> Self {
        let inner = Arc::new_cyclic(|this| FieldInner {
            parent,
            key: Arc::new(key),
            signal: Signal::new(),
            state: Mutex::new(FieldState::Unsubscribed),
            epoch: AtomicU64::new(0),
            this: this.clone(),
        });
        Self { inner }
    }

    /// The field currently selected by the parent's value.
    pub fn field(&self) -> F {
        (self.inner.key)(&self.inner.parent.value())
    }
}

impl<P: ObservableValue, F: ObservableValue> ObservableValue for FieldValue<P, F> {
    type Value = F::Value;

    fn value(&self) -> F::Value {
        self.inner.value()
    }

    fn changes(&self) -> Source<ValueChange<F::Value>> {
        self.inner.signal.source_with_delegate(Arc::clone(&self.inner))
    }
}

impl<P: ObservableValue, F: ObservableValue> Clone for FieldValue<P, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: ObservableValue, F: ObservableValue> fmt::Debug for FieldValue<P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribed = matches!(&*self.inner.state.lock(), FieldState::Subscribed { .. });
        f.debug_struct("FieldValue")
            .field("subscribed", &subscribed)
            .finish_non_exhaustive()
    }
}

/// A [`FieldValue`] whose writes go to the currently selected field.
pub struct UpdatableFieldValue<P: ObservableValue, F: UpdatableValue> {
    observable: FieldValue<P, F>,
}

impl<P: ObservableValue, F: UpdatableValue> UpdatableFieldValue<P, F> {
    pub fn new(parent: P, key: impl Fn(&P::Value) -> F + Send + Sync + 'static) -> Self {
        Self {
            observable: FieldValue::new(parent, key),
        }
    }

    pub fn field(&self) -> F {
        self.observable.field()
    }
}

impl<P: ObservableValue, F: UpdatableValue> ObservableValue for UpdatableFieldValue<P, F> {
    type Value = F::Value;

    fn value(&self) -> F::Value {
        self.observable.value()
    }

    fn changes(&self) -> Source<ValueChange<F::Value>> {
        self.observable.changes()
    }
}

impl<P: ObservableValue, F: UpdatableValue> UpdatableValue for UpdatableFieldValue<P, F> {
    fn set_value(&self, value: F::Value) {
        self.observable.field().set_value(value);
    }
}

impl<P: ObservableValue, F: UpdatableValue> Clone for UpdatableFieldValue<P, F> {
    fn clone(&self) -> Self {
        Self {
            observable: self.observable.clone(),
        }
    }
}

impl<P: ObservableValue, F: UpdatableValue> fmt::Debug for UpdatableFieldValue<P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UpdatableFieldValue")
            .field(&self.observable)
            .finish()
    }
}
