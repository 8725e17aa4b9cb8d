//! Left-right map coordinator.

use crate::arena::Arena;
use crate::designator::{ArenaSide, Designator};
use crate::oplog::OpLog;
use crate::reader::ReadHandle;
use crate::registry::{Registry, wait_for_readers};
use lrmap_common::{LrMapError, MapConfig, Result};
use parking_lot::{Mutex, MutexGuard};
use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Writer-side state. Only reachable through the writer lock.
pub(crate) struct WriterState<K, V> {
    /// Arena that writes go to. Always the opposite of the designator.
    write_side: ArenaSide,
    /// Writes since the last flush.
    log: OpLog<K, V>,
    /// Live readers.
    pub(crate) registry: Registry,
    /// Completed flushes.
    flushes: u64,
    /// Set once an invariant violation is detected. Every later flush
    /// reports it again.
    fault: Option<LrMapError>,
}

impl<K, V> WriterState<K, V> {
    #[inline]
    fn check_fault(&self) -> Result<()> {
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }
}

/// State shared between the coordinator and every reader handle.
pub(crate) struct Shared<K, V, A> {
    arenas: [UnsafeCell<A>; 2],
    designator: Designator,
    writer: Mutex<WriterState<K, V>>,
    config: MapConfig,
}

// SAFETY: readers only take shared references to the arena named by their
// snapshot, and the writer only takes a mutable reference to the other arena
// after every reader that could still see it has left. `A: Sync` covers the
// concurrent shared access, `A: Send` the writer mutating from its own thread.
unsafe impl<K: Send, V: Send, A: Send + Sync> Sync for Shared<K, V, A> {}

impl<K, V, A> Shared<K, V, A> {
    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, WriterState<K, V>> {
        self.writer.lock()
    }

    /// Returns the side new readers should snapshot.
    #[inline(always)]
    pub(crate) fn read_side(&self) -> Result<ArenaSide> {
        self.designator.load()
    }

    /// Shared access to an arena from a reader.
    ///
    /// # Safety
    /// `side` must come from a designator load made inside a read section
    /// that the caller has not left yet.
    #[inline(always)]
    pub(crate) unsafe fn read_arena(&self, side: ArenaSide) -> &A {
        unsafe { &*self.arenas[side.index()].get() }
    }

    /// Exclusive access to the write-side arena.
    ///
    /// # Safety
    /// Caller must hold the writer lock and pass `WriterState::write_side`.
    /// No reader can be looking at that arena: readers that entered before
    /// the last swap were waited out, readers that entered after it saw the
    /// other side.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    unsafe fn write_arena(&self, side: ArenaSide) -> &mut A {
        unsafe { &mut *self.arenas[side.index()].get() }
    }
}

/// Result of a completed flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Operations replayed onto the vacated arena.
    pub replayed: usize,
    /// Readers that were inside a section at swap time.
    pub waited_readers: usize,
    /// Polling rounds spent waiting for them.
    pub rounds: u32,
    /// Wall time of the whole flush, including the lock acquisition.
    pub elapsed: Duration,
}

/// Point-in-time statistics about a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapStats {
    /// Registered reader handles.
    pub readers: usize,
    /// Readers currently inside a read section.
    pub readers_inside: usize,
    /// Writes not yet published.
    pub pending_ops: usize,
    /// Completed flushes.
    pub flushes: u64,
    /// Entries in the write-side arena.
    pub len: usize,
    /// Arena currently exposed to readers.
    pub read_side: ArenaSide,
}

/// A concurrent map with lock-free readers and a single serialized writer.
///
/// Writes go to one arena and are recorded in a redo log. Readers see the
/// other arena and only observe writes after [`flush`](Self::flush) swaps
/// the two and replays the log onto the arena the readers just vacated.
///
/// All writer operations take an internal lock, so the map can be shared
/// behind an `Arc`. Flushing from a thread that holds a reader handle inside
/// a read section deadlocks: the flush waits for that reader forever.
pub struct LeftRightMap<K, V, A = HashMap<K, V>> {
    shared: Arc<Shared<K, V, A>>,
}

impl<K, V> LeftRightMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty map backed by two hash maps.
    pub fn new() -> Self {
        Self::build(MapConfig::default())
    }
}

impl<K, V> Default for LeftRightMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A> LeftRightMap<K, V, A>
where
    A: Arena<K, V>,
{
    /// Creates an empty map with the given configuration.
    pub fn with_config(config: MapConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MapConfig) -> Self {
        let left = A::with_capacity(config.initial_capacity);
        let right = A::with_capacity(config.initial_capacity);
        let read_side = ArenaSide::Left;

        Self {
            shared: Arc::new(Shared {
                arenas: [UnsafeCell::new(left), UnsafeCell::new(right)],
                designator: Designator::new(read_side),
                writer: Mutex::new(WriterState {
                    write_side: read_side.other(),
                    log: OpLog::new(),
                    registry: Registry::new(),
                    flushes: 0,
                    fault: None,
                }),
                config,
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MapConfig {
        &self.shared.config
    }

    /// Inserts or overwrites a value. Readers see it after the next flush.
    ///
    /// Fails with the stored fault once the map is poisoned.
    pub fn set(&self, key: K, value: V) -> Result<()>
    where
        K: Clone,
        V: Clone,
    {
        let mut state = self.shared.lock();
        state.check_fault()?;
        // SAFETY: writer lock held, write side named by the writer state.
        let arena = unsafe { self.shared.write_arena(state.write_side) };
        arena.insert(key.clone(), value.clone());
        state.log.log_set(key, value);
        Ok(())
    }

    /// Removes a key if present. Readers see it after the next flush.
    ///
    /// Fails with the stored fault once the map is poisoned.
    pub fn delete(&self, key: K) -> Result<()> {
        let mut state = self.shared.lock();
        state.check_fault()?;
        // SAFETY: writer lock held, write side named by the writer state.
        let arena = unsafe { self.shared.write_arena(state.write_side) };
        arena.remove(&key);
        state.log.log_delete(key);
        Ok(())
    }

    /// Runs `f` against the write-side arena under the writer lock.
    fn with_write_arena<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        let state = self.shared.lock();
        // SAFETY: writer lock held, write side named by the writer state.
        let arena = unsafe { self.shared.write_arena(state.write_side) };
        f(arena)
    }

    /// Looks up a key, including writes that have not been flushed yet.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.with_write_arena(|arena| arena.get(key).cloned())
    }

    /// Like [`get`](Self::get), falling back to `V::default()`.
    pub fn get_or_default(&self, key: &K) -> V
    where
        V: Clone + Default,
    {
        self.get(key).unwrap_or_default()
    }

    /// Returns true if the key is present on the write side.
    pub fn contains_key(&self, key: &K) -> bool {
        self.with_write_arena(|arena| arena.get(key).is_some())
    }

    /// Returns the number of entries on the write side.
    pub fn len(&self) -> usize {
        self.with_write_arena(|arena| arena.len())
    }

    /// Returns true if the write side has no entries.
    pub fn is_empty(&self) -> bool {
        self.with_write_arena(|arena| arena.is_empty())
    }

    /// Returns the arena currently exposed to readers. Does not take the
    /// writer lock.
    pub fn read_side(&self) -> Result<ArenaSide> {
        self.shared.read_side()
    }

    /// Returns the number of writes waiting for the next flush.
    pub fn pending_ops(&self) -> usize {
        self.shared.lock().log.len()
    }

    /// Publishes every pending write to readers that enter afterwards.
    ///
    /// Holds the writer lock for the whole call:
    /// 1. swaps the designator so new readers see the current write arena;
    /// 2. records every reader inside a section at that moment;
    /// 3. waits, with exponential backoff, until each of them has left;
    /// 4. replays the log onto the arena they vacated and clears it.
    ///
    /// Blocks indefinitely if a recorded reader never leaves. If the arena
    /// panics during replay, the map is poisoned and the panic resumes.
    pub fn flush(&self) -> Result<FlushReport> {
        let start = Instant::now();
        let mut guard = self.shared.lock();
        let state = &mut *guard;

        state.check_fault()?;

        let read_side = match self.shared.read_side() {
            Ok(side) if side == state.write_side.other() => side,
            Ok(side) => {
                let fault = LrMapError::Internal(format!(
                    "designator names the write side ({})",
                    side
                ));
                return Err(self.poison(state, fault));
            }
            Err(fault) => return Err(self.poison(state, fault)),
        };

        self.shared.designator.publish(state.write_side);
        state.write_side = read_side;

        let pending = state.registry.snapshot_inside();
        let quiescence = wait_for_readers(pending, &self.shared.config.backoff);

        // SAFETY: writer lock held and every reader that could have seen
        // this arena has left it.
        let arena = unsafe { self.shared.write_arena(state.write_side) };
        let replayed = match catch_unwind(AssertUnwindSafe(|| state.log.replay_into(arena))) {
            Ok(replayed) => replayed,
            Err(payload) => {
                // The log is gone and the arenas no longer match.
                self.poison(
                    state,
                    LrMapError::Internal("arena panicked during replay".to_string()),
                );
                resume_unwind(payload)
            }
        };
        state.flushes += 1;

        let report = FlushReport {
            replayed,
            waited_readers: quiescence.waited,
            rounds: quiescence.rounds,
            elapsed: start.elapsed(),
        };

        debug!(
            flush = state.flushes,
            replayed = report.replayed,
            waited_readers = report.waited_readers,
            rounds = report.rounds,
            elapsed_us = report.elapsed.as_micros() as u64,
            read_side = %state.write_side.other(),
            "flushed"
        );

        Ok(report)
    }

    /// Alias for [`flush`](Self::flush).
    #[inline]
    pub fn commit(&self) -> Result<FlushReport> {
        self.flush()
    }

    /// Records a fatal fault and shuts the read path. Sections already open
    /// keep their snapshot; no new one can start.
    fn poison(&self, state: &mut WriterState<K, V>, fault: LrMapError) -> LrMapError {
        error!(error = %fault, "left-right map invariant violated");
        self.shared.designator.poison();
        state.fault = Some(fault.clone());
        fault
    }

    /// Registers a new reader handle.
    ///
    /// Fails with the stored fault once the map is poisoned.
    pub fn new_reader(&self) -> Result<ReadHandle<K, V, A>> {
        let slot = {
            let mut state = self.shared.lock();
            state.check_fault()?;
            state.registry.register()
        };
        debug!(reader = %slot.id(), "registered reader");
        Ok(ReadHandle::new(Arc::clone(&self.shared), slot))
    }

    /// Returns statistics about the map.
    pub fn stats(&self) -> MapStats {
        let state = self.shared.lock();
        // SAFETY: writer lock held, write side named by the writer state.
        let len = unsafe { self.shared.write_arena(state.write_side) }.len();

        MapStats {
            readers: state.registry.len(),
            readers_inside: state.registry.inside_count(),
            pending_ops: state.log.len(),
            flushes: state.flushes,
            len,
            read_side: state.write_side.other(),
        }
    }
}

impl<K, V, A> std::fmt::Debug for LeftRightMap<K, V, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("LeftRightMap")
            .field("write_side", &state.write_side)
            .field("pending_ops", &state.log.len())
            .field("readers", &state.registry.len())
            .field("flushes", &state.flushes)
            .finish_non_exhaustive()
    }
}
