//! Registry of live readers and the quiescence wait run by every flush.

use crate::slot::{ReaderId, ReaderSlot, is_inside};
use lrmap_common::BackoffConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Set of registered readers.
///
/// Lives inside the writer state, so it is only touched under the writer
/// lock.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    slots: HashMap<ReaderId, Arc<ReaderSlot>>,
    next_id: u64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a fresh slot and returns it.
    pub(crate) fn register(&mut self) -> Arc<ReaderSlot> {
        let id = ReaderId(self.next_id);
        self.next_id += 1;

        let slot = Arc::new(ReaderSlot::new(id));
        self.slots.insert(id, Arc::clone(&slot));
        slot
    }

    /// Removes a slot. Returns false if it was not registered.
    pub(crate) fn deregister(&mut self, id: ReaderId) -> bool {
        self.slots.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Counts readers currently inside a read section.
    pub(crate) fn inside_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.is_inside()).count()
    }

    /// Records every reader that is inside a section right now, together
    /// with the exact epoch it was seen at.
    pub(crate) fn snapshot_inside(&self) -> Vec<PendingReader> {
        self.slots
            .values()
            .filter_map(|slot| {
                let epoch = slot.epoch();
                is_inside(epoch).then(|| PendingReader {
                    slot: Arc::clone(slot),
                    epoch,
                })
            })
            .collect()
    }
}

/// A reader that was inside a section when the designator was swapped.
#[derive(Debug)]
pub(crate) struct PendingReader {
    slot: Arc<ReaderSlot>,
    epoch: u64,
}

impl PendingReader {
    /// True once the reader has left the section it was seen in.
    #[inline]
    fn has_moved_on(&self) -> bool {
        self.slot.epoch() != self.epoch
    }
}

/// Outcome of a quiescence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Quiescence {
    /// Readers that had to be waited for.
    pub(crate) waited: usize,
    /// Sleeps taken before every reader moved on.
    pub(crate) rounds: u32,
}

/// Blocks until every pending reader's epoch differs from its snapshot.
///
/// There is no timeout. A reader that never leaves its section keeps this
/// loop polling at `backoff.max_delay` forever.
pub(crate) fn wait_for_readers(
    mut pending: Vec<PendingReader>,
    backoff: &BackoffConfig,
) -> Quiescence {
    let waited = pending.len();
    let mut rounds = 0u32;
    let mut delay = backoff.initial_delay;

    loop {
        pending.retain(|reader| !reader.has_moved_on());
        if pending.is_empty() {
            return Quiescence { waited, rounds };
        }

        if delay >= backoff.max_delay {
            warn!(
                remaining = pending.len(),
                delay_ms = delay.as_millis() as u64,
                readers = ?pending.iter().map(|r| r.slot.id().0).collect::<Vec<_>>(),
                "flush still waiting on readers inside a read section"
            );
        } else {
            trace!(remaining = pending.len(), delay = ?delay, "waiting for readers");
        }

        std::thread::sleep(delay);
        rounds = rounds.saturating_add(1);
        delay = backoff.next_delay(delay);
    }
}
