//! Mutable observable arrays.

use super::{assert_index, assert_range, ObservableArray};
use crate::changes::{ArrayChange, ArrayModification};
use crate::error::Result;
use crate::signal::{Signal, Source};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

struct ArrayVariableInner<T> {
    items: Mutex<Vec<T>>,
    signal: Signal<ArrayChange<T>>,
}

/// A mutable, observable array.
///
/// Every mutation emits the corresponding [`ArrayChange`]; mutations that do
/// not change anything emit nothing. Clones share the same elements.
pub struct ArrayVariable<T> {
    inner: Arc<ArrayVariableInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> ArrayVariable<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            inner: Arc::new(ArrayVariableInner {
                items: Mutex::new(items),
                signal: Signal::new(),
            }),
        }
    }

    pub fn insert(&self, index: usize, element: T) {
        self.update(|items| {
            assert!(
                index <= items.len(),
                "insert index {index} out of bounds (count {})",
                items.len()
            );
            let change = ArrayChange::with_modification(
                items.len(),
                ArrayModification::Insert {
                    index,
                    element: element.clone(),
                },
            );
            items.insert(index, element);
            change
        });
    }

    pub fn push(&self, element: T) {
        self.update(|items| {
            let index = items.len();
            let change = ArrayChange::with_modification(
                index,
                ArrayModification::Insert {
                    index,
                    element: element.clone(),
                },
            );
            items.push(element);
            change
        });
    }

    /// Remove and return the element at `index`.
    pub fn remove(&self, index: usize) -> T {
        self.update_returning(|items| {
            assert_index(index, items.len());
            let count = items.len();
            let element = items.remove(index);
            let change = ArrayChange::with_modification(
                count,
                ArrayModification::Remove {
                    index,
                    element: element.clone(),
                },
            );
            (change, element)
        })
    }

    /// Replace the element at `index`, returning the old one.
    pub fn replace(&self, index: usize, element: T) -> T {
        self.update_returning(|items| {
            assert_index(index, items.len());
            let old = std::mem::replace(&mut items[index], element.clone());
            let change = ArrayChange::with_modification(
                items.len(),
                ArrayModification::Replace {
                    index,
                    old: old.clone(),
                    new: element,
                },
            );
            (change, old)
        })
    }

    /// Replace the elements in `range` with `elements`.
    pub fn replace_range(&self, range: Range<usize>, elements: Vec<T>) {
        self.update(|items| {
            assert_range(&range, items.len());
            splice(items, range, elements)
        });
    }

    /// Replace every element.
    pub fn set(&self, elements: Vec<T>) {
        self.update(|items| {
            let count = items.len();
            splice(items, 0..count, elements)
        });
    }

    /// Apply a change produced elsewhere.
    ///
    /// Nothing is modified (and nothing emitted) if the change does not fit
    /// the current elements.
    pub fn apply(&self, change: ArrayChange<T>) -> Result<()> {
        let _sends = self.inner.signal.lock_sends();
        {
            let mut items = self.inner.items.lock();
            let mut updated = items.clone();
            change.apply(&mut updated)?;
            *items = updated;
        }
        if !change.is_empty() {
            self.inner.signal.send(change);
        }
        Ok(())
    }

    /// Number of sinks currently observing the array.
    pub fn subscriber_count(&self) -> usize {
        self.inner.signal.subscriber_count()
    }

    fn update(&self, mutate: impl FnOnce(&mut Vec<T>) -> ArrayChange<T>) {
        self.update_returning(|items| (mutate(items), ()))
    }

    /// Mutate under the lock, then emit the resulting change outside it.
    ///
    /// Sends stay locked from before the mutation until the change is out,
    /// so concurrent mutators deliver in mutation order.
    fn update_returning<R>(&self, mutate: impl FnOnce(&mut Vec<T>) -> (ArrayChange<T>, R)) -> R {
        let _sends = self.inner.signal.lock_sends();
        let (change, result) = mutate(&mut self.inner.items.lock());
        if !change.is_empty() {
            self.inner.signal.send(change);
        }
        result
    }
}

fn splice<T: Clone>(items: &mut Vec<T>, range: Range<usize>, elements: Vec<T>) -> ArrayChange<T> {
    let count = items.len();
    let index = range.start;
    let old: Vec<T> = items.splice(range, elements.iter().cloned()).collect();
    let mut change = ArrayChange::new(count);
    if let Some(modification) = ArrayModification::from_parts(index, old, elements) {
        change.push(modification);
    }
    change
}

impl<T: Clone + Send + Sync + 'static> ObservableArray for ArrayVariable<T> {
    type Element = T;

    fn count(&self) -> usize {
        self.inner.items.lock().len()
    }

    fn get(&self, index: usize) -> T {
        let items = self.inner.items.lock();
        assert_index(index, items.len());
        items[index].clone()
    }

    fn slice(&self, range: Range<usize>) -> Vec<T> {
        let items = self.inner.items.lock();
        assert_range(&range, items.len());
        items[range].to_vec()
    }

    fn value(&self) -> Vec<T> {
        self.inner.items.lock().clone()
    }

    fn changes(&self) -> Source<ArrayChange<T>> {
        self.inner.signal.source()
    }

    fn is_buffered(&self) -> bool {
        true
    }
}

impl<T> Clone for ArrayVariable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ArrayVariable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArrayVariable")
            .field(&*self.inner.items.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record<T: Clone + Send + Sync + 'static>(
        array: &ArrayVariable<T>,
    ) -> (Arc<Mutex<Vec<ArrayChange<T>>>>, crate::signal::Connection) {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&changes);
        let connection = array
            .changes()
            .connect(move |c: &ArrayChange<T>| log.lock().push(c.clone()));
        (changes, connection)
    }

    #[test]
    fn test_mutations_emit_changes() {
        let array = ArrayVariable::new(vec![1, 2, 3]);
        let (changes, _c) = record(&array);

        array.push(4);
        array.insert(0, 0);
        assert_eq!(array.remove(1), 1);
        assert_eq!(array.replace(0, 10), 0);
        assert_eq!(array.value(), vec![10, 2, 3, 4]);

        let changes = changes.lock();
        assert_eq!(changes.len(), 4);
        assert_eq!(
            changes[0],
            ArrayChange::with_modification(3, ArrayModification::Insert { index: 3, element: 4 })
        );
        assert_eq!(
            changes[2],
            ArrayChange::with_modification(5, ArrayModification::Remove { index: 1, element: 1 })
        );
        assert_eq!(
            changes[3],
            ArrayChange::with_modification(
                4,
                ArrayModification::Replace { index: 0, old: 0, new: 10 }
            )
        );
    }

    #[test]
    fn test_replace_range() {
        let array = ArrayVariable::new(vec!['a', 'b', 'c', 'd']);
        let (changes, _c) = record(&array);

        array.replace_range(1..3, vec!['x']);
        assert_eq!(array.value(), vec!['a', 'x', 'd']);
        assert_eq!(
            changes.lock()[0],
            ArrayChange::with_modification(
                4,
                ArrayModification::ReplaceSlice {
                    index: 1,
                    old: vec!['b', 'c'],
                    new: vec!['x']
                }
            )
        );

        // Nothing replaced by nothing: no change at all.
        array.replace_range(2..2, vec![]);
        assert_eq!(changes.lock().len(), 1);
    }

    #[test]
    fn test_apply_rejects_mismatched_change() {
        let array = ArrayVariable::new(vec![1, 2]);
        let (changes, _c) = record(&array);

        let change =
            ArrayChange::with_modification(3, ArrayModification::Remove { index: 0, element: 1 });
        assert!(array.apply(change).is_err());
        assert_eq!(array.value(), vec![1, 2]);
        assert!(changes.lock().is_empty());
    }

    #[test]
    fn test_reads() {
        let array = ArrayVariable::new(vec![5, 6, 7]);
        assert_eq!(array.count(), 3);
        assert_eq!(array.get(1), 6);
        assert_eq!(array.slice(1..3), vec![6, 7]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_get_out_of_range_panics() {
        let array = ArrayVariable::new(vec![1]);
        array.get(1);
    }
}
