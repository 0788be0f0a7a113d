//! Filtering an array on per-element observable predicates.

use crate::changes::{ArrayChange, ArrayModification, ValueChange};
use crate::filter::{ElementConnections, FilterIndex, SlotId};
use crate::observable::{assert_index, assert_range, ObservableArray, ObservableValue};
use crate::signal::{Connection, Signal, Source};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

struct FilterState<T> {
    index: FilterIndex<T>,
    /// The parent's elements as of the last change folded in.
    items: Vec<T>,
    connections: ElementConnections,
}

struct FilterInner<A: ObservableArray, B> {
    _parent: A,
    test: Arc<dyn Fn(&A::Element) -> B + Send + Sync>,
    state: Mutex<FilterState<A::Element>>,
    signal: Signal<ArrayChange<A::Element>>,
    this: Weak<Self>,
    _parent_connection: Connection,
}

/// Subscribe to the predicate of the element owning `slot`.
fn watch<A, B>(
    this: &Weak<FilterInner<A, B>>,
    test: &(dyn Fn(&A::Element) -> B + Send + Sync),
    element: &A::Element,
    slot: SlotId,
) -> Connection
where
    A: ObservableArray,
    B: ObservableValue<Value = bool>,
{
    let this = this.clone();
    test(element)
        .changes()
        .connect(move |change: &ValueChange<bool>| {
            if let Some(inner) = this.upgrade() {
                inner.element_changed(slot, change);
            }
        })
}

impl<A, B> FilterInner<A, B>
where
    A: ObservableArray,
    B: ObservableValue<Value = bool>,
{
    fn parent_changed(&self, change: &ArrayChange<A::Element>) {
        let _sends = self.signal.lock_sends();
        let (filtered, released) = {
            let mut state = self.state.lock();
            assert_eq!(
                change.initial_count(),
                state.items.len(),
                "change does not match the filtered array's source count"
            );
            // New elements are watched before their predicates are read, so a
            // flip racing with this change waits on the lock instead of
            // getting lost.
            let mut released = Vec::new();
            for modification in change.modifications() {
                let range = modification.input_range();
                let new = modification.new_elements();
                let (slots, removed) = state.connections.replace(range.clone(), new.len());
                released.extend(removed);
                for (slot, element) in slots.into_iter().zip(new) {
                    let connection = watch(&self.this, &*self.test, element, slot);
                    released.extend(state.connections.attach(slot, connection));
                }
                state.items.splice(range, new.iter().cloned()).for_each(drop);
            }
            (state.index.apply(change), released)
        };
        drop(released);

        if !filtered.is_empty() {
            debug!(
                initial_count = filtered.initial_count(),
                modifications = filtered.modifications().len(),
                "forwarding filtered change"
            );
            self.signal.send(filtered);
        }
    }

    fn element_changed(&self, slot: SlotId, change: &ValueChange<bool>) {
        if change.is_noop() {
            return;
        }
        let _sends = self.signal.lock_sends();
        let filtered = {
            let mut state = self.state.lock();
            let Some(position) = state.connections.position(slot) else {
                trace!("predicate change of a removed element ignored");
                return;
            };
            let count = state.index.count();
            let element = state.items[position].clone();
            let modification = if change.new {
                state
                    .index
                    .insert(position)
                    .map(|index| ArrayModification::Insert { index, element })
            } else {
                state
                    .index
                    .remove(position)
                    .map(|index| ArrayModification::Remove { index, element })
            };
            modification.map(|m| ArrayChange::with_modification(count, m))
        };
        if let Some(filtered) = filtered {
            debug!(
                initial_count = filtered.initial_count(),
                "forwarding filtered element toggle"
            );
            self.signal.send(filtered);
        }
    }
}

/// The elements of an array whose predicate observable is currently `true`.
///
/// `test` maps each element to an observable boolean. The filter follows
/// both structural changes of the parent and changes of every element's
/// predicate, emitting changes in terms of positions within the filtered
/// array. It subscribes to its parent on construction and stays subscribed
/// for as long as it exists.
pub struct FilteredArray<A: ObservableArray, B> {
    inner: Arc<FilterInner<A, B>>,
}

impl<A, B> FilteredArray<A, B>
where
    A: ObservableArray,
    B: ObservableValue<Value = bool>,
{
    pub fn new(parent: A, test: impl Fn(&A::Element) -> B + Send + Sync + 'static) -> Self {
        let test: Arc<dyn Fn(&A::Element) -> B + Send + Sync> = Arc::new(test);

        let inner = Arc::new_cyclic(|this: &Weak<FilterInner<A, B>>| {
            let items = parent.value();
            let (mut connections, slots) = ElementConnections::with_len(items.len());
            for (slot, element) in slots.into_iter().zip(&items) {
                connections.attach(slot, watch(this, &*test, element, slot));
            }
            let predicate = Arc::clone(&test);
            let index = FilterIndex::new(&items, move |element| predicate(element).value());

            let weak = this.clone();
            let parent_connection = parent.changes().connect(move |change| {
                if let Some(inner) = weak.upgrade() {
                    inner.parent_changed(change);
                }
            });
            FilterInner {
                _parent: parent,
                test,
                state: Mutex::new(FilterState {
                    index,
                    items,
                    connections,
                }),
                signal: Signal::new(),
                this: this.clone(),
                _parent_connection: parent_connection,
            }
        });

        Self { inner }
    }

    /// Source indices of the elements currently passing the filter.
    pub fn matching_indices(&self) -> Vec<usize> {
        self.inner.state.lock().index.matching_indices().to_vec()
    }
}

impl<A, B> ObservableArray for FilteredArray<A, B>
where
    A: ObservableArray,
    B: ObservableValue<Value = bool>,
{
    type Element = A::Element;

    fn count(&self) -> usize {
        self.inner.state.lock().index.count()
    }

    fn get(&self, index: usize) -> A::Element {
        let state = self.inner.state.lock();
        assert_index(index, state.index.count());
        state.items[state.index.source_index(index)].clone()
    }

    fn slice(&self, range: Range<usize>) -> Vec<A::Element> {
        let state = self.inner.state.lock();
        assert_range(&range, state.index.count());
        state.index.matching_indices()[range]
            .iter()
            .map(|&index| state.items[index].clone())
            .collect()
    }

    fn value(&self) -> Vec<A::Element> {
        let state = self.inner.state.lock();
        state
            .index
            .matching_indices()
            .iter()
            .map(|&index| state.items[index].clone())
            .collect()
    }

    fn changes(&self) -> Source<ArrayChange<A::Element>> {
        self.inner.signal.source_retaining(Arc::clone(&self.inner))
    }
}

impl<A: ObservableArray, B> Clone for FilteredArray<A, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ObservableArray, B> fmt::Debug for FilteredArray<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("FilteredArray")
            .field("matching", &state.index.matching_indices())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::{ArrayVariable, Constant, Variable};
    use std::thread::{self, JoinHandle};

    fn record<A: ObservableArray>(
        array: &A,
    ) -> (Arc<Mutex<Vec<ArrayChange<A::Element>>>>, Connection) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let connection = array
            .changes()
            .connect(move |c: &ArrayChange<A::Element>| log.lock().push(c.clone()));
        (seen, connection)
    }

    #[test]
    fn test_even_filter_scenario() {
        let numbers = ArrayVariable::new(vec![1, 2, 3, 4]);
        let evens = FilteredArray::new(numbers.clone(), |x: &i32| Constant::new(x % 2 == 0));
        assert_eq!(evens.value(), vec![2, 4]);
        let (seen, _c) = record(&evens);

        numbers.replace(0, 5);
        assert_eq!(evens.value(), vec![2, 4]);
        assert!(seen.lock().is_empty());

        numbers.replace(0, 6);
        assert_eq!(evens.value(), vec![6, 2, 4]);
        assert_eq!(
            *seen.lock(),
            vec![ArrayChange::with_modification(
                2,
                ArrayModification::Insert { index: 0, element: 6 }
            )]
        );
    }

    #[derive(Clone, Debug)]
    struct Task {
        name: &'static str,
        done: Variable<bool>,
    }

    fn task(name: &'static str, done: bool) -> Task {
        Task {
            name,
            done: Variable::new(done),
        }
    }

    fn names(tasks: &[Task]) -> Vec<&'static str> {
        tasks.iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_element_toggles() {
        let tasks = ArrayVariable::new(vec![task("a", false), task("b", true), task("c", false)]);
        let done = FilteredArray::new(tasks.clone(), |t: &Task| t.done.clone());
        assert_eq!(names(&done.value()), vec!["b"]);
        let (seen, _c) = record(&done);

        tasks.get(2).done.set(true);
        assert_eq!(names(&done.value()), vec!["b", "c"]);
        tasks.get(1).done.set(false);
        assert_eq!(names(&done.value()), vec!["c"]);
        // Setting the same value again changes nothing.
        tasks.get(1).done.set(false);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].initial_count(), 1);
        assert_eq!(seen[0].modifications()[0].index(), 1);
        assert_eq!(seen[1].initial_count(), 2);
        assert!(matches!(
            seen[1].modifications()[0],
            ArrayModification::Remove { index: 0, .. }
        ));
    }

    #[test]
    fn test_removed_elements_are_unobserved() {
        let tasks = ArrayVariable::new(vec![task("a", true), task("b", true)]);
        let done = FilteredArray::new(tasks.clone(), |t: &Task| t.done.clone());
        let (seen, _c) = record(&done);

        let removed = tasks.remove(0);
        assert_eq!(removed.done.subscriber_count(), 0);
        assert_eq!(seen.lock().len(), 1);

        removed.done.set(false);
        assert_eq!(seen.lock().len(), 1);

        // The remaining element is tracked at its new position.
        tasks.get(0).done.set(false);
        assert!(done.value().is_empty());
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].initial_count(), 1);
        match &seen[1].modifications()[0] {
            ArrayModification::Remove { index, element } => {
                assert_eq!(*index, 0);
                assert_eq!(element.name, "b");
            }
            other => panic!("unexpected modification {other:?}"),
        }
    }

    #[test]
    fn test_inserted_elements_are_observed() {
        let tasks = ArrayVariable::new(vec![task("a", true)]);
        let done = FilteredArray::new(tasks.clone(), |t: &Task| t.done.clone());

        tasks.insert(0, task("z", false));
        assert_eq!(names(&done.value()), vec!["a"]);
        assert_eq!(done.matching_indices(), vec![1]);

        tasks.get(0).done.set(true);
        assert_eq!(names(&done.value()), vec!["z", "a"]);
    }

    #[test]
    fn test_batched_change_realigns_predicates() {
        let tasks = ArrayVariable::new(vec![task("a", true), task("b", false), task("c", true)]);
        let done = FilteredArray::new(tasks.clone(), |t: &Task| t.done.clone());
        let (seen, _c) = record(&done);

        let d = task("d", true);
        let e = task("e", false);
        let mut change = ArrayChange::new(3);
        change
            .add(ArrayModification::Remove {
                index: 0,
                element: tasks.get(0),
            })
            .unwrap();
        change
            .add(ArrayModification::Insert {
                index: 1,
                element: d.clone(),
            })
            .unwrap();
        change
            .add(ArrayModification::Insert {
                index: 3,
                element: e.clone(),
            })
            .unwrap();
        tasks.apply(change).unwrap();

        assert_eq!(names(&tasks.value()), vec!["b", "d", "c", "e"]);
        assert_eq!(names(&done.value()), vec!["d", "c"]);
        assert_eq!(done.matching_indices(), vec![1, 2]);
        assert_eq!(seen.lock().len(), 1);

        // Predicates are watched at their elements' new positions.
        e.done.set(true);
        tasks.get(0).done.set(true);
        d.done.set(false);
        assert_eq!(names(&done.value()), vec!["b", "c", "e"]);
        assert_eq!(done.matching_indices(), vec![0, 2, 3]);
    }

    /// A predicate whose flag gets flipped by another thread right after
    /// each read.
    struct FlippedAfterRead {
        flag: Variable<bool>,
        flippers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    }

    impl ObservableValue for FlippedAfterRead {
        type Value = bool;

        fn value(&self) -> bool {
            let value = self.flag.get();
            let flag = self.flag.clone();
            self.flippers.lock().push(thread::spawn(move || {
                flag.set(!value);
            }));
            value
        }

        fn changes(&self) -> Source<ValueChange<bool>> {
            self.flag.changes()
        }
    }

    #[test]
    fn test_flip_during_insertion_is_not_lost() {
        let flags = ArrayVariable::new(Vec::<Variable<bool>>::new());
        let flippers = Arc::new(Mutex::new(Vec::new()));
        let handles = Arc::clone(&flippers);
        let on = FilteredArray::new(flags.clone(), move |flag: &Variable<bool>| FlippedAfterRead {
            flag: flag.clone(),
            flippers: Arc::clone(&handles),
        });

        let flag = Variable::new(false);
        flags.push(flag.clone());
        let spawned: Vec<_> = flippers.lock().drain(..).collect();
        assert_eq!(spawned.len(), 1);
        for handle in spawned {
            handle.join().unwrap();
        }

        assert!(flag.get());
        assert_eq!(on.matching_indices(), vec![0]);
        assert_eq!(on.count(), 1);
    }
}
