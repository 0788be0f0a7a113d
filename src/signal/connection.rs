//! Disconnectable subscription handles.

use super::source::Source;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Counter for generating connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Callback = Box<dyn FnOnce(ConnectionId) + Send>;

/// Teardown bookkeeping, guarded by the connection's lock.
struct Teardown {
    callbacks: Vec<Callback>,
    disconnected: bool,
}

struct ConnectionInner {
    id: ConnectionId,
    teardown: Mutex<Teardown>,
}

impl ConnectionInner {
    fn disconnect(&self) {
        let callbacks = {
            let mut teardown = self.teardown.lock();
            if teardown.disconnected {
                return;
            }
            teardown.disconnected = true;
            std::mem::take(&mut teardown.callbacks)
        };

        trace!(connection = self.id.0, callbacks = callbacks.len(), "disconnected");
        for callback in callbacks {
            callback(self.id);
        }
    }

    fn add_callback(&self, callback: Callback) {
        let callback = {
            let mut teardown = self.teardown.lock();
            if !teardown.disconnected {
                teardown.callbacks.push(callback);
                return;
            }
            callback
        };
        callback(self.id);
    }

    fn is_disconnected(&self) -> bool {
        self.teardown.lock().disconnected
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// An association between a source and a sink.
///
/// As long as the connection is alive, values from the source reach the sink.
/// The connection strongly holds whatever its teardown callbacks capture
/// (typically the source's signal); all of it is released on disconnect.
///
/// Dropping the last handle disconnects. Clones share the same connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// A live connection with no teardown callbacks yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId::next(),
                teardown: Mutex::new(Teardown {
                    callbacks: Vec::new(),
                    disconnected: false,
                }),
            }),
        }
    }

    /// A live connection that runs `callback` on disconnect.
    pub fn with_callback(callback: impl FnOnce(ConnectionId) + Send + 'static) -> Self {
        let connection = Self::new();
        connection.add_callback(callback);
        connection
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Disconnect, running every teardown callback exactly once.
    ///
    /// Idempotent and safe to call from any thread, including from inside a
    /// teardown callback. Callbacks run synchronously on the calling thread,
    /// in registration order.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Register a callback to run exactly once on disconnection.
    ///
    /// If the connection is already disconnected the callback runs right away,
    /// on this thread.
    pub fn add_callback(&self, callback: impl FnOnce(ConnectionId) + Send + 'static) {
        self.inner.add_callback(Box::new(callback));
    }

    pub fn is_disconnected(&self) -> bool {
        self.inner.is_disconnected()
    }

    /// A source that fires once after this connection is disconnected.
    ///
    /// The source does not keep the connection alive. Connecting to it after
    /// the connection is gone (disconnected or dropped) fires immediately.
    pub fn disconnect_source(&self) -> Source<()> {
        let target: Weak<ConnectionInner> = Arc::downgrade(&self.inner);
        Source::new(move |sink| match target.upgrade() {
            Some(target) => {
                let pending = Arc::new(Mutex::new(Some(sink)));
                let fire = Arc::clone(&pending);
                target.add_callback(Box::new(move |_| {
                    let sink = fire.lock().take();
                    if let Some(sink) = sink {
                        sink(&());
                    }
                }));
                Connection::with_callback(move |_| {
                    pending.lock().take();
                })
            }
            None => {
                sink(&());
                Connection::new()
            }
        })
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}
