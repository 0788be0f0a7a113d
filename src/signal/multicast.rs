//! Lazily activated multicast signals.

use super::connection::{Connection, ConnectionId};
use super::source::{Sink, Source};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Lifecycle hooks of a signal's upstream resource.
///
/// `start` runs when the signal gets its first subscriber, before that
/// subscriber can receive anything; `stop` runs after the last subscriber
/// leaves. Neither hook may connect to or disconnect from the same signal.
pub trait SignalDelegate<T>: Send + Sync {
    fn start(&self, signal: &Signal<T>);
    fn stop(&self, signal: &Signal<T>);
}

/// What an active signal keeps alive.
enum Retained<T> {
    Delegate(Arc<dyn SignalDelegate<T>>),
    Owner(#[allow(dead_code)] Arc<dyn Any + Send + Sync>),
}

struct Subscriber<T> {
    id: ConnectionId,
    sink: Sink<T>,
    /// Sequence number of the first value this subscriber may receive.
    since: u64,
}

/// Subscriber bookkeeping, guarded by the signal's lock.
struct SignalState<T> {
    subscribers: Vec<Subscriber<T>>,
    active: bool,
    retained: Option<Retained<T>>,
    /// Sequence number of the next value sent.
    sequence: u64,
}

/// Values waiting for the send already in progress on the owning thread.
struct Delivery<T> {
    sending: bool,
    pending: VecDeque<(u64, T)>,
}

struct SignalInner<T> {
    state: Mutex<SignalState<T>>,
    /// Serializes activation and deactivation, including the delegate hooks.
    transition: Mutex<()>,
    /// Held by the thread sending; re-entrant so sinks can send again.
    delivery: ReentrantMutex<RefCell<Delivery<T>>>,
}

/// Keeps other threads from sending on a signal, see [`Signal::lock_sends`].
pub struct SendGuard<'a, T> {
    _guard: ReentrantMutexGuard<'a, RefCell<Delivery<T>>>,
}

/// Clears the in-progress flag even if a sink panics.
struct Sending<'a, T>(&'a RefCell<Delivery<T>>);

impl<T> Drop for Sending<'_, T> {
    fn drop(&mut self) {
        let mut delivery = self.0.borrow_mut();
        delivery.sending = false;
        delivery.pending.clear();
    }
}

/// A multicast channel delivering values to every connected sink.
///
/// The signal is inactive while it has no subscribers. Gaining the first
/// subscriber activates it, losing the last deactivates it; sources created
/// with [`Signal::source_with_delegate`] or [`Signal::source_retaining`] hook
/// a delegate or an owner into those transitions.
///
/// A signal should be exposed through one kind of source only: the delegate
/// or owner is installed by whichever source activates the signal.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T: Send + 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                state: Mutex::new(SignalState {
                    subscribers: Vec::new(),
                    active: false,
                    retained: None,
                    sequence: 0,
                }),
                transition: Mutex::new(()),
                delivery: ReentrantMutex::new(RefCell::new(Delivery {
                    sending: false,
                    pending: VecDeque::new(),
                })),
            }),
        }
    }

    /// True while at least one sink is connected.
    pub fn is_connected(&self) -> bool {
        !self.inner.state.lock().subscribers.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// Deliver `value` to every connected sink, in subscription order.
    ///
    /// Sinks run synchronously on this thread, outside the signal's lock, so
    /// they may connect or disconnect freely. Sending with no subscribers
    /// delivers nothing. Sends from other threads wait until this one has
    /// finished.
    ///
    /// A sink that sends on the same signal does not recurse: its value is
    /// queued and delivered by the outer `send` once every sink has seen the
    /// current value, so all sinks observe values in the order they were
    /// sent. A sink only receives values sent after it connected.
    pub fn send(&self, value: T) {
        let guard = self.inner.delivery.lock();
        let sequence = {
            let mut state = self.inner.state.lock();
            if state.subscribers.is_empty() {
                return;
            }
            state.sequence += 1;
            state.sequence - 1
        };
        {
            let mut delivery = guard.borrow_mut();
            delivery.pending.push_back((sequence, value));
            if delivery.sending {
                trace!(sequence, "re-entrant send queued");
                return;
            }
            delivery.sending = true;
        }

        let _sending = Sending(&*guard);
        loop {
            let next = guard.borrow_mut().pending.pop_front();
            let Some((sequence, value)) = next else {
                break;
            };
            self.deliver(sequence, &value);
        }
    }

    /// Hold off sends from other threads until the guard is dropped.
    ///
    /// Mutators take this before changing their state and keep it until the
    /// change has been sent, so concurrent mutations are delivered in the
    /// order they were made. The lock is re-entrant: the holding thread, and
    /// sinks it runs, can still send.
    pub fn lock_sends(&self) -> SendGuard<'_, T> {
        SendGuard {
            _guard: self.inner.delivery.lock(),
        }
    }

    fn deliver(&self, sequence: u64, value: &T) {
        let sinks: Vec<Sink<T>> = self
            .inner
            .state
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.since <= sequence)
            .map(|s| Arc::clone(&s.sink))
            .collect();
        for sink in sinks {
            sink(value);
        }
    }

    /// Connect a sink directly.
    pub fn connect(&self, sink: impl Fn(&T) + Send + Sync + 'static) -> Connection {
        self.connect_with(Arc::new(sink), None)
    }

    /// A source connecting to this signal with no lifecycle hooks.
    pub fn source(&self) -> Source<T> {
        let signal = self.clone();
        Source::new(move |sink| signal.connect_with(sink, None))
    }

    /// A source that starts `delegate` on activation and stops it on
    /// deactivation. The delegate is kept alive while the signal is active.
    pub fn source_with_delegate<D: SignalDelegate<T> + 'static>(&self, delegate: Arc<D>) -> Source<T> {
        let signal = self.clone();
        Source::new(move |sink| {
            let delegate: Arc<dyn SignalDelegate<T>> = delegate.clone();
            signal.connect_with(sink, Some(Retained::Delegate(delegate)))
        })
    }

    /// A source that keeps `owner` alive for as long as the signal has
    /// subscribers.
    pub fn source_retaining<O: Send + Sync + 'static>(&self, owner: Arc<O>) -> Source<T> {
        let signal = self.clone();
        Source::new(move |sink| {
            let owner: Arc<dyn Any + Send + Sync> = owner.clone();
            signal.connect_with(sink, Some(Retained::Owner(owner)))
        })
    }

    fn connect_with(&self, sink: Sink<T>, retained: Option<Retained<T>>) -> Connection {
        let connection = Connection::new();
        let id = connection.id();

        let transition = self.inner.transition.lock();
        let mut unused = None;
        let activated = {
            let mut state = self.inner.state.lock();
            if state.active {
                unused = retained;
                None
            } else {
                state.active = true;
                let delegate = match &retained {
                    Some(Retained::Delegate(delegate)) => Some(Arc::clone(delegate)),
                    _ => None,
                };
                state.retained = retained;
                Some(delegate)
            }
        };
        if let Some(delegate) = activated {
            trace!(connection = id.0, "signal activated");
            if let Some(delegate) = delegate {
                delegate.start(self);
            }
        }
        {
            let mut state = self.inner.state.lock();
            let since = state.sequence;
            state.subscribers.push(Subscriber { id, sink, since });
        }
        drop(transition);
        drop(unused);

        let signal = self.clone();
        connection.add_callback(move |id| signal.disconnect_subscriber(id));
        connection
    }

    fn disconnect_subscriber(&self, id: ConnectionId) {
        let transition = self.inner.transition.lock();
        let (removed, delegate) = {
            let mut state = self.inner.state.lock();
            let Some(position) = state.subscribers.iter().position(|s| s.id == id) else {
                return;
            };
            let removed = state.subscribers.remove(position);
            if !state.subscribers.is_empty() {
                drop(state);
                drop(transition);
                drop(removed);
                return;
            }
            let delegate = match &state.retained {
                Some(Retained::Delegate(delegate)) => Some(Arc::clone(delegate)),
                _ => None,
            };
            (removed, delegate)
        };

        if let Some(delegate) = &delegate {
            delegate.stop(self);
        }
        let released = {
            let mut state = self.inner.state.lock();
            state.active = false;
            state.retained.take()
        };
        trace!(connection = id.0, "signal deactivated");
        drop(transition);

        // Sinks, delegates and owners may own connections of their own;
        // release them only after both locks are gone.
        drop(removed);
        drop(delegate);
        drop(released);
    }
}

impl<T: Send + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Signal")
            .field("active", &state.active)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;

    #[derive(Default)]
    struct CountingDelegate {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl SignalDelegate<i32> for CountingDelegate {
        fn start(&self, signal: &Signal<i32>) {
            assert!(!signal.is_connected());
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn stop(&self, signal: &Signal<i32>) {
            assert!(!signal.is_connected());
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let signal = Signal::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&log);
        let second = Arc::clone(&log);
        let _a = signal.connect(move |v: &i32| first.lock().push(("a", *v)));
        let _b = signal.connect(move |v: &i32| second.lock().push(("b", *v)));

        signal.send(7);
        assert_eq!(*log.lock(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_delegate_lifecycle() {
        let signal = Signal::new();
        let delegate = Arc::new(CountingDelegate::default());
        let source = signal.source_with_delegate(Arc::clone(&delegate));

        let a = source.connect(|_| {});
        let b = source.connect(|_| {});
        assert_eq!(delegate.starts.load(Ordering::SeqCst), 1);
        assert_eq!(delegate.stops.load(Ordering::SeqCst), 0);

        a.disconnect();
        assert_eq!(delegate.stops.load(Ordering::SeqCst), 0);
        b.disconnect();
        assert_eq!(delegate.stops.load(Ordering::SeqCst), 1);

        let _c = source.connect(|_| {});
        assert_eq!(delegate.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_owner_retained_while_subscribed() {
        let signal = Signal::<i32>::new();
        let owner = Arc::new(String::from("owner"));
        let weak: Weak<String> = Arc::downgrade(&owner);
        let source = signal.source_retaining(owner);

        let connection = source.connect(|_| {});
        drop(source);
        assert!(weak.upgrade().is_some());

        connection.disconnect();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_sink_may_disconnect_itself() {
        let signal = Signal::new();
        let received = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Connection>>> = Arc::new(Mutex::new(None));

        let counter = Arc::clone(&received);
        let own = Arc::clone(&slot);
        let connection = signal.connect(move |_: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            let connection = own.lock().take();
            if let Some(connection) = connection {
                connection.disconnect();
            }
        });
        *slot.lock() = Some(connection);

        signal.send(1);
        signal.send(2);
        assert_eq!(received.load(Ordering::SeqCst), 1);
        assert!(!signal.is_connected());
    }

    #[test]
    fn test_reentrant_send_is_delivered_after_current_value() {
        let signal = Signal::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let resend = signal.clone();
        let first = Arc::clone(&log);
        let _a = signal.connect(move |v: &i32| {
            first.lock().push(("a", *v));
            if *v == 1 {
                resend.send(2);
            }
        });
        let second = Arc::clone(&log);
        let _b = signal.connect(move |v: &i32| second.lock().push(("b", *v)));

        signal.send(1);
        assert_eq!(*log.lock(), vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn test_sink_connected_during_send_skips_queued_values() {
        let signal = Signal::new();
        let late = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::new(Mutex::new(Vec::new()));

        let inner = signal.clone();
        let log = Arc::clone(&late);
        let connections = Arc::clone(&keep);
        let _a = signal.connect(move |v: &i32| {
            if *v == 1 {
                // Queued before the late sink exists.
                inner.send(2);
                let log = Arc::clone(&log);
                connections
                    .lock()
                    .push(inner.connect(move |v: &i32| log.lock().push(*v)));
                inner.send(3);
            }
        });

        signal.send(1);
        assert_eq!(*late.lock(), vec![3]);
    }

    #[test]
    fn test_panicking_sink_does_not_wedge_signal() {
        let signal = Signal::new();
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        let _c = signal.connect(move |v: &i32| {
            assert!(*v != 1, "bad value");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let sender = signal.clone();
        let result = std::thread::spawn(move || sender.send(1)).join();
        assert!(result.is_err());
        signal.send(2);
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_without_subscribers_is_noop() {
        let signal = Signal::<i32>::new();
        signal.send(1);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
