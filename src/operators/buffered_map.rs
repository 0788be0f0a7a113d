//! Cached array transformation.

use crate::changes::{ArrayChange, ArrayModification};
use crate::observable::{assert_index, assert_range, ObservableArray};
use crate::signal::{Connection, Signal, Source};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Weak};

struct BufferedInner<T, U> {
    transform: Box<dyn Fn(&T) -> U + Send + Sync>,
    cache: Mutex<Vec<U>>,
    signal: Signal<ArrayChange<U>>,
    _connection: Connection,
}

impl<T, U: Clone + Send + Sync + 'static> BufferedInner<T, U> {
    fn apply(&self, change: &ArrayChange<T>) {
        let _sends = self.signal.lock_sends();
        let mapped = {
            let mut cache = self.cache.lock();
            assert_eq!(
                change.initial_count(),
                cache.len(),
                "change does not match the buffered element count"
            );
            let mut mapped = self
                .signal
                .is_connected()
                .then(|| ArrayChange::new(cache.len()));
            for modification in change.modifications() {
                let range = modification.input_range();
                let new: Vec<U> = modification
                    .new_elements()
                    .iter()
                    .map(|element| (self.transform)(element))
                    .collect();
                match &mut mapped {
                    Some(mapped) => {
                        // Old values come from the cache as it is before this edit.
                        let old: Vec<U> = cache.splice(range, new.iter().cloned()).collect();
                        if let Some(edit) = ArrayModification::from_parts(modification.index(), old, new) {
                            mapped.push(edit);
                        }
                    }
                    None => cache.splice(range, new).for_each(drop),
                }
            }
            mapped
        };
        if let Some(mapped) = mapped.filter(|change| !change.is_empty()) {
            self.signal.send(mapped);
        }
    }
}

/// An array caching `transform` of every element of its parent.
///
/// The cache is kept up to date from the moment of construction, whether or
/// not anything observes this array. While there are subscribers, each
/// parent change is re-expressed against the cache in the same pass that
/// updates it.
pub struct BufferedMappedArray<T, U> {
    inner: Arc<BufferedInner<T, U>>,
}

impl<T, U> BufferedMappedArray<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    pub fn new<A>(parent: &A, transform: impl Fn(&T) -> U + Send + Sync + 'static) -> Self
    where
        A: ObservableArray<Element = T>,
    {
        let cache: Vec<U> = parent.value().iter().map(&transform).collect();
        let inner = Arc::new_cyclic(|this: &Weak<BufferedInner<T, U>>| {
            let this = this.clone();
            let connection = parent.changes().connect(move |change| {
                if let Some(inner) = this.upgrade() {
                    inner.apply(change);
                }
            });
            BufferedInner {
                transform: Box::new(transform),
                cache: Mutex::new(cache),
                signal: Signal::new(),
                _connection: connection,
            }
        });
        Self { inner }
    }
}

impl<T, U> ObservableArray for BufferedMappedArray<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    type Element = U;

    fn count(&self) -> usize {
        self.inner.cache.lock().len()
    }

    fn get(&self, index: usize) -> U {
        let cache = self.inner.cache.lock();
        assert_index(index, cache.len());
        cache[index].clone()
    }

    fn slice(&self, range: Range<usize>) -> Vec<U> {
        let cache = self.inner.cache.lock();
        assert_range(&range, cache.len());
        cache[range].to_vec()
    }

    fn value(&self) -> Vec<U> {
        self.inner.cache.lock().clone()
    }

    fn changes(&self) -> Source<ArrayChange<U>> {
        self.inner.signal.source_retaining(Arc::clone(&self.inner))
    }

    fn is_buffered(&self) -> bool {
        true
    }
}

impl<T, U> Clone for BufferedMappedArray<T, U> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, U: fmt::Debug> fmt::Debug for BufferedMappedArray<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BufferedMappedArray")
            .field(&*self.inner.cache.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::ArrayVariable;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cache_follows_parent_without_subscribers() {
        let numbers = ArrayVariable::new(vec![1, 2, 3]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let scaled = BufferedMappedArray::new(&numbers, move |x: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            x * 10
        });
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        numbers.remove(1);
        assert_eq!(scaled.value(), vec![10, 30]);
        assert!(scaled.is_buffered());
        // Removal needs no transform calls.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_mapped_change_reads_old_values_from_cache() {
        let numbers = ArrayVariable::new(vec![1, 2, 3, 4]);
        let scaled = BufferedMappedArray::new(&numbers, |x: &i32| x * 10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let _c = scaled
            .changes()
            .connect(move |c: &ArrayChange<i32>| log.lock().push(c.clone()));

        numbers.replace_range(1..3, vec![7, 8, 9]);
        assert_eq!(scaled.value(), vec![10, 70, 80, 90, 40]);
        assert_eq!(
            *seen.lock(),
            vec![ArrayChange::with_modification(
                4,
                ArrayModification::ReplaceSlice {
                    index: 1,
                    old: vec![20, 30],
                    new: vec![70, 80, 90],
                }
            )]
        );
    }

    #[test]
    fn test_survives_while_observed() {
        let numbers = ArrayVariable::new(vec![1]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let connection = BufferedMappedArray::new(&numbers, |x: &i32| x + 1)
            .changes()
            .connect(move |c: &ArrayChange<i32>| log.lock().push(c.clone()));

        numbers.push(5);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].modifications()[0].new_elements(), &[6]);

        drop(connection);
        assert_eq!(numbers.subscriber_count(), 0);
    }

    #[test]
    fn test_batched_change_maps_each_modification() {
        let numbers = ArrayVariable::new(vec![1, 2, 3]);
        let scaled = BufferedMappedArray::new(&numbers, |x: &i32| x * 10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let _c = scaled
            .changes()
            .connect(move |c: &ArrayChange<i32>| log.lock().push(c.clone()));

        let mut change = ArrayChange::new(3);
        change
            .add(ArrayModification::Replace { index: 0, old: 1, new: 4 })
            .unwrap();
        change
            .add(ArrayModification::Remove { index: 1, element: 2 })
            .unwrap();
        change
            .add(ArrayModification::Insert { index: 2, element: 5 })
            .unwrap();
        numbers.apply(change).unwrap();

        assert_eq!(scaled.value(), vec![40, 30, 50]);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].initial_count(), 3);
        assert_eq!(
            seen[0].modifications(),
            &[
                ArrayModification::Replace { index: 0, old: 10, new: 40 },
                ArrayModification::Remove { index: 1, element: 20 },
                ArrayModification::Insert { index: 2, element: 50 },
            ]
        );
    }
}
