//! Per-element connection table.

use crate::signal::Connection;
use std::ops::Range;

/// Stable handle to one element's slot in an [`ElementConnections`] table.
///
/// The handle survives edits elsewhere in the sequence. Once its element is
/// removed, the handle goes stale and [`ElementConnections::position`]
/// returns `None` for it, even if the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    live: bool,
    position: usize,
    connection: Option<Connection>,
}

/// One connection per element of a sequence, kept index-aligned with it.
///
/// Slots live in an arena and are addressed by [`SlotId`]; `order` maps
/// sequence positions to slots. Every structural edit goes through
/// [`ElementConnections::replace`], which also re-indexes the slots after
/// the edit point so each slot knows its element's current position.
#[derive(Debug, Default)]
pub struct ElementConnections {
    slots: Vec<Slot>,
    free: Vec<usize>,
    order: Vec<usize>,
}

impl ElementConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table of `count` empty slots.
    pub fn with_len(count: usize) -> (Self, Vec<SlotId>) {
        let mut table = Self::new();
        let (slots, _) = table.replace(0..0, count);
        (table, slots)
    }

    /// Number of elements tracked.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Replace the slots of the elements in `range` with `count` new ones.
    ///
    /// Returns the ids of the new slots, in order, and the connections that
    /// belonged to the removed elements. The caller drops those connections,
    /// outside any lock it holds.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds.
    pub fn replace(&mut self, range: Range<usize>, count: usize) -> (Vec<SlotId>, Vec<Connection>) {
        assert!(
            range.start <= range.end && range.end <= self.order.len(),
            "range {range:?} out of bounds (count {})",
            self.order.len()
        );
        let start = range.start;

        let released: Vec<usize> = self.order.drain(range).collect();
        let mut connections = Vec::new();
        for index in released {
            let slot = &mut self.slots[index];
            slot.live = false;
            slot.generation += 1;
            connections.extend(slot.connection.take());
            self.free.push(index);
        }

        let ids: Vec<SlotId> = (0..count).map(|_| self.allocate()).collect();
        self.order
            .splice(start..start, ids.iter().map(|id| id.index));
        self.reindex(start);
        (ids, connections)
    }

    /// Store `connection` in `slot`.
    ///
    /// Returns whatever the call displaced: the slot's previous connection,
    /// or `connection` itself if the slot went stale in the meantime.
    pub fn attach(&mut self, slot: SlotId, connection: Connection) -> Option<Connection> {
        match self.slot_mut(slot) {
            Some(entry) => entry.connection.replace(connection),
            None => Some(connection),
        }
    }

    /// Current position of the element owning `slot`.
    pub fn position(&self, slot: SlotId) -> Option<usize> {
        self.slots
            .get(slot.index)
            .filter(|entry| entry.live && entry.generation == slot.generation)
            .map(|entry| entry.position)
    }

    /// Release every slot, returning the connections held.
    pub fn clear(&mut self) -> Vec<Connection> {
        let (_, connections) = self.replace(0..self.order.len(), 0);
        connections
    }

    fn allocate(&mut self) -> SlotId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.live = true;
                SlotId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    live: true,
                    position: 0,
                    connection: None,
                });
                SlotId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn slot_mut(&mut self, slot: SlotId) -> Option<&mut Slot> {
        self.slots
            .get_mut(slot.index)
            .filter(|entry| entry.live && entry.generation == slot.generation)
    }

    fn reindex(&mut self, from: usize) {
        for (position, &index) in self.order.iter().enumerate().skip(from) {
            self.slots[index].position = position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_positions_follow_edits() {
        let (mut table, ids) = ElementConnections::with_len(3);
        assert_eq!(table.len(), 3);
        assert_eq!(table.position(ids[2]), Some(2));

        let (inserted, _) = table.replace(0..0, 2);
        assert_eq!(table.position(inserted[1]), Some(1));
        assert_eq!(table.position(ids[0]), Some(2));
        assert_eq!(table.position(ids[2]), Some(4));

        table.replace(2..3, 0);
        assert_eq!(table.position(ids[0]), None);
        assert_eq!(table.position(ids[1]), Some(2));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_stale_ids_stay_stale_after_reuse() {
        let (mut table, ids) = ElementConnections::with_len(1);
        table.replace(0..1, 0);
        let (reused, _) = table.replace(0..0, 1);
        assert_eq!(reused[0].index, ids[0].index);
        assert_eq!(table.position(ids[0]), None);
        assert_eq!(table.position(reused[0]), Some(0));
    }

    #[test]
    fn test_removed_connections_are_returned() {
        let disconnected = Arc::new(AtomicUsize::new(0));
        let (mut table, ids) = ElementConnections::with_len(2);
        for id in &ids {
            let counter = Arc::clone(&disconnected);
            let connection = Connection::with_callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert!(table.attach(*id, connection).is_none());
        }

        let (_, removed) = table.replace(1..2, 0);
        assert_eq!(removed.len(), 1);
        assert_eq!(disconnected.load(Ordering::SeqCst), 0);
        drop(removed);
        assert_eq!(disconnected.load(Ordering::SeqCst), 1);

        // Attaching to a stale slot hands the connection back.
        let returned = table.attach(ids[1], Connection::new());
        assert!(returned.is_some());

        drop(table.clear());
        assert_eq!(disconnected.load(Ordering::SeqCst), 2);
        assert!(table.is_empty());
    }
}
