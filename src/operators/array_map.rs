//! Unbuffered array transformation.

use crate::changes::ArrayChange;
use crate::observable::ObservableArray;
use crate::signal::Source;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// An array whose elements are `transform` of its parent's elements.
///
/// Every read applies the transform again; use
/// [`BufferedMappedArray`](super::BufferedMappedArray) when the transform is
/// expensive or reads are frequent.
pub struct MappedArray<A: ObservableArray, U> {
    parent: A,
    transform: Arc<dyn Fn(&A::Element) -> U + Send + Sync>,
}

impl<A: ObservableArray, U> MappedArray<A, U> {
    pub fn new(parent: A, transform: impl Fn(&A::Element) -> U + Send + Sync + 'static) -> Self {
        Self {
            parent,
            transform: Arc::new(transform),
        }
    }
}

impl<A, U> ObservableArray for MappedArray<A, U>
where
    A: ObservableArray,
    U: Clone + Send + Sync + 'static,
{
    type Element = U;

    fn count(&self) -> usize {
        self.parent.count()
    }

    fn get(&self, index: usize) -> U {
        (self.transform)(&self.parent.get(index))
    }

    fn slice(&self, range: Range<usize>) -> Vec<U> {
        self.parent
            .slice(range)
            .iter()
            .map(|element| (self.transform)(element))
            .collect()
    }

    fn value(&self) -> Vec<U> {
        self.parent
            .value()
            .iter()
            .map(|element| (self.transform)(element))
            .collect()
    }

    fn changes(&self) -> Source<ArrayChange<U>> {
        let transform = Arc::clone(&self.transform);
        self.parent
            .changes()
            .map(move |change| change.map(|element| transform(element)))
    }
}

impl<A: ObservableArray + Clone, U> Clone for MappedArray<A, U> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            transform: Arc::clone(&self.transform),
        }
    }
}

impl<A: ObservableArray + fmt::Debug, U> fmt::Debug for MappedArray<A, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedArray")
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}
