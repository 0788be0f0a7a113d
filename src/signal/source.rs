//! Type-erased subscribable sources.

use super::connection::Connection;
use std::fmt;
use std::sync::Arc;

/// A callback consuming delivered values.
pub type Sink<T> = Arc<dyn Fn(&T) + Send + Sync>;

type Subscribe<T> = dyn Fn(Sink<T>) -> Connection + Send + Sync;

/// Something sinks can connect to.
///
/// Observables hand out sources for their change streams; connecting returns
/// the [`Connection`] that keeps the sink subscribed.
pub struct Source<T> {
    subscribe: Arc<Subscribe<T>>,
}

impl<T: 'static> Source<T> {
    /// Create a source from its subscribe function.
    pub fn new(subscribe: impl Fn(Sink<T>) -> Connection + Send + Sync + 'static) -> Self {
        Self {
            subscribe: Arc::new(subscribe),
        }
    }

    /// A source that never fires.
    pub fn empty() -> Self {
        Self::new(|_| Connection::new())
    }

    /// Connect a sink; it receives values until the returned connection is
    /// disconnected or dropped.
    pub fn connect(&self, sink: impl Fn(&T) + Send + Sync + 'static) -> Connection {
        self.connect_sink(Arc::new(sink))
    }

    pub fn connect_sink(&self, sink: Sink<T>) -> Connection {
        (self.subscribe)(sink)
    }

    /// A source delivering `transform` of every value of this one.
    pub fn map<U: 'static>(&self, transform: impl Fn(&T) -> U + Send + Sync + 'static) -> Source<U> {
        let upstream = self.clone();
        let transform = Arc::new(transform);
        Source::new(move |sink: Sink<U>| {
            let transform = Arc::clone(&transform);
            upstream.connect(move |value| sink(&transform(value)))
        })
    }

    /// A source delivering only the values `transform` maps to `Some`.
    pub fn filter_map<U: 'static>(
        &self,
        transform: impl Fn(&T) -> Option<U> + Send + Sync + 'static,
    ) -> Source<U> {
        let upstream = self.clone();
        let transform = Arc::new(transform);
        Source::new(move |sink: Sink<U>| {
            let transform = Arc::clone(&transform);
            upstream.connect(move |value| {
                if let Some(mapped) = transform(value) {
                    sink(&mapped);
                }
            })
        })
    }
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe: Arc::clone(&self.subscribe),
        }
    }
}

impl<T> fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").finish_non_exhaustive()
    }
}
