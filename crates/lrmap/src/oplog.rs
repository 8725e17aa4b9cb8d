//! Redo log of writes issued since the last flush.
//!
//! Every write is applied to the write-side arena immediately and recorded
//! here. A flush replays the log onto the other arena once readers have left
//! it, which brings both arenas back to the same contents.

use crate::arena::Arena;

/// A single recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operation<K, V> {
    /// Insert or overwrite `key` with `value`.
    Set { key: K, value: V },
    /// Remove `key` if present.
    Delete { key: K },
}

impl<K, V> Operation<K, V> {
    /// Applies the operation to an arena, consuming it.
    #[inline]
    pub(crate) fn apply<A: Arena<K, V>>(self, arena: &mut A) {
        match self {
            Operation::Set { key, value } => arena.insert(key, value),
            Operation::Delete { key } => arena.remove(&key),
        }
    }
}

/// Ordered log of operations. Append order is application order.
#[derive(Debug)]
pub(crate) struct OpLog<K, V> {
    ops: Vec<Operation<K, V>>,
}

impl<K, V> OpLog<K, V> {
    /// Creates an empty log.
    pub(crate) fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Records an insert.
    #[inline]
    pub(crate) fn log_set(&mut self, key: K, value: V) {
        self.ops.push(Operation::Set { key, value });
    }

    /// Records a removal.
    #[inline]
    pub(crate) fn log_delete(&mut self, key: K) {
        self.ops.push(Operation::Delete { key });
    }

    /// Returns the number of pending operations.
    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    /// Replays every operation onto `arena` in recorded order and empties
    /// the log. The log's buffer is released as well.
    ///
    /// The log is emptied before replay starts. If the arena panics part
    /// way, the remaining operations are lost and the caller must treat
    /// the arenas as diverged.
    ///
    /// Returns the number of operations replayed.
    pub(crate) fn replay_into<A: Arena<K, V>>(&mut self, arena: &mut A) -> usize {
        let ops = std::mem::take(&mut self.ops);
        let replayed = ops.len();
        for op in ops {
            op.apply(arena);
        }
        replayed
    }
}
