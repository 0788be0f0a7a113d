//! Unbuffered value transformation.

use crate::changes::ValueChange;
use crate::observable::ObservableValue;
use crate::signal::Source;
use std::fmt;
use std::sync::Arc;

/// An observable whose value is `transform` of its parent's value.
///
/// Nothing is cached: reads apply the transform to the parent's current
/// value, and changes are the parent's changes mapped through it.
pub struct MappedValue<P: ObservableValue, U> {
    parent: P,
    transform: Arc<dyn Fn(&P::Value) -> U + Send + Sync>,
}

impl<P: ObservableValue, U> MappedValue<P, U> {
    pub fn new(parent: P, transform: impl Fn(&P::Value) -> U + Send + Sync + 'static) -> Self {
        Self {
            parent,
            transform: Arc::new(transform),
        }
    }
}

impl<P, U> ObservableValue for MappedValue<P, U>
where
    P: ObservableValue,
    U: Clone + Send + Sync + 'static,
{
    type Value = U;

    fn value(&self) -> U {
        (self.transform)(&self.parent.value())
    }

    fn changes(&self) -> Source<ValueChange<U>> {
        let transform = Arc::clone(&self.transform);
        self.parent
            .changes()
            .map(move |change| change.map(|value| transform(value)))
    }
}

impl<P: ObservableValue + Clone, U> Clone for MappedValue<P, U> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            transform: Arc::clone(&self.transform),
        }
    }
}

impl<P: ObservableValue + fmt::Debug, U> fmt::Debug for MappedValue<P, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedValue")
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::Variable;
    use parking_lot::Mutex;

    #[test]
    fn test_map_value() {
        let count = Variable::new(2);
        let label = MappedValue::new(count.clone(), |n: &i32| format!("{n} items"));
        assert_eq!(label.value(), "2 items");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let _c = label
            .changes()
            .connect(move |c: &ValueChange<String>| log.lock().push(c.clone()));
        count.set(3);
        assert_eq!(
            *seen.lock(),
            vec![ValueChange::new("2 items".to_string(), "3 items".to_string())]
        );
    }
}
