//! Observable element count of an array.

use crate::changes::ValueChange;
use crate::observable::{ObservableArray, ObservableValue};
use crate::signal::Source;

/// The number of elements of an array, as an observable value.
///
/// Changes are emitted only for parent changes that alter the count.
#[derive(Clone, Debug)]
pub struct ArrayCount<A> {
    parent: A,
}

impl<A: ObservableArray> ArrayCount<A> {
    pub fn new(parent: A) -> Self {
        Self { parent }
    }
}

impl<A: ObservableArray> ObservableValue for ArrayCount<A> {
    type Value = usize;

    fn value(&self) -> usize {
        self.parent.count()
    }

    fn changes(&self) -> Source<ValueChange<usize>> {
        self.parent.changes().filter_map(|change| {
            let old = change.initial_count();
            let new = change.final_count();
            (old != new).then(|| ValueChange::new(old, new))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::ArrayVariable;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_count_changes() {
        let letters = ArrayVariable::new(vec!['a', 'b']);
        let count = ArrayCount::new(letters.clone());
        assert_eq!(count.value(), 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let _c = count
            .changes()
            .connect(move |c: &ValueChange<usize>| log.lock().push(c.clone()));

        letters.push('c');
        letters.replace(0, 'z');
        letters.replace_range(0..3, vec!['x']);
        assert_eq!(count.value(), 1);
        assert_eq!(
            *seen.lock(),
            vec![ValueChange::new(2, 3), ValueChange::new(3, 1)]
        );
    }
}
