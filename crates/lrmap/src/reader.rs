//! Reader handles.

use crate::arena::Arena;
use crate::designator::ArenaSide;
use crate::map::Shared;
use crate::slot::{ReaderId, ReaderSlot};
use lrmap_common::{LrMapError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One reader's session on a [`LeftRightMap`](crate::LeftRightMap).
///
/// Reads happen inside a section opened with [`enter`](Self::enter) and
/// closed with [`leave`](Self::leave). On enter the handle snapshots which
/// arena is readable and serves every lookup from it until it leaves, so a
/// section never observes a flush that happens while it is open.
///
/// References returned by lookups borrow the handle, and `leave` needs
/// `&mut self`, so they cannot outlive the section.
///
/// A handle is owned by one thread at a time. Dropping it releases it; an
/// explicit [`release`](Self::release) reports misuse instead.
pub struct ReadHandle<K, V, A = HashMap<K, V>> {
    shared: Arc<Shared<K, V, A>>,
    slot: Arc<ReaderSlot>,
    /// Arena snapshot taken by the current section.
    live: Option<ArenaSide>,
    registered: bool,
}

impl<K, V, A> ReadHandle<K, V, A> {
    pub(crate) fn new(shared: Arc<Shared<K, V, A>>, slot: Arc<ReaderSlot>) -> Self {
        Self {
            shared,
            slot,
            live: None,
            registered: true,
        }
    }

    /// Returns the reader ID.
    pub fn id(&self) -> ReaderId {
        self.slot.id()
    }

    /// Returns the current epoch. Odd while inside a section.
    pub fn epoch(&self) -> u64 {
        self.slot.epoch()
    }

    /// Returns true between `enter` and `leave`.
    #[inline]
    pub fn is_inside(&self) -> bool {
        self.live.is_some()
    }

    /// Returns false once the handle has been released.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    #[inline]
    fn ensure_registered(&self) -> Result<()> {
        if self.registered {
            Ok(())
        } else {
            Err(LrMapError::HandleReleased)
        }
    }

    /// Opens a section and returns the arena side it snapshotted.
    fn begin(&mut self) -> Result<ArenaSide> {
        self.ensure_registered()?;
        if self.live.is_some() {
            return Err(LrMapError::AlreadyEntered);
        }

        self.slot.enter();
        match self.shared.read_side() {
            Ok(side) => {
                self.live = Some(side);
                Ok(side)
            }
            Err(e) => {
                self.slot.leave();
                Err(e)
            }
        }
    }

    /// Closes the current section. Caller checks that one is open.
    #[inline]
    fn exit(&mut self) {
        debug_assert!(self.slot.is_inside());
        self.live = None;
        self.slot.leave();
    }

    /// Starts a read section.
    ///
    /// Fails with `AlreadyEntered` if a section is already open.
    pub fn enter(&mut self) -> Result<()> {
        self.begin().map(|_| ())
    }

    /// Ends the current read section.
    ///
    /// Fails with `NotEntered` if no section is open.
    pub fn leave(&mut self) -> Result<()> {
        self.ensure_registered()?;
        if self.live.is_none() {
            return Err(LrMapError::NotEntered);
        }
        self.exit();
        Ok(())
    }

    /// Removes the handle from the map's registry.
    ///
    /// Fails with `ReleaseWhileInside` if a section is open. Every later
    /// call on the handle fails with `HandleReleased`.
    pub fn release(&mut self) -> Result<()> {
        self.ensure_registered()?;
        if self.live.is_some() {
            return Err(LrMapError::ReleaseWhileInside);
        }

        self.shared.lock().registry.deregister(self.slot.id());
        self.registered = false;
        debug!(reader = %self.slot.id(), "released reader");
        Ok(())
    }

    /// Returns the snapshotted arena of the open section.
    #[inline]
    fn snapshot(&self) -> Result<&A> {
        self.ensure_registered()?;
        let side = self.live.ok_or(LrMapError::NotEntered)?;
        // SAFETY: `live` is only set inside a section, and the section cannot
        // end while the returned borrow of `self` is alive.
        Ok(unsafe { self.shared.read_arena(side) })
    }
}

impl<K, V, A> ReadHandle<K, V, A>
where
    A: Arena<K, V>,
{
    /// Looks up a key in the section's snapshot.
    #[inline]
    pub fn get(&self, key: &K) -> Result<Option<&V>> {
        Ok(self.snapshot()?.get(key))
    }

    /// Like [`get`](Self::get), falling back to `V::default()`.
    pub fn get_or_default(&self, key: &K) -> Result<V>
    where
        V: Clone + Default,
    {
        Ok(self.get(key)?.cloned().unwrap_or_default())
    }

    /// Returns true if the snapshot holds the key.
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        Ok(self.snapshot()?.get(key).is_some())
    }

    /// Returns the number of entries in the snapshot.
    pub fn len(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    /// Returns true if the snapshot is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.snapshot()?.is_empty())
    }

    /// Visits every entry of the snapshot in arena order.
    /// Stops as soon as the function returns false.
    pub fn for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.snapshot()?.for_each(f);
        Ok(())
    }

    /// Enters a section that is left when the returned guard drops.
    pub fn read(&mut self) -> Result<ReadGuard<'_, K, V, A>> {
        let side = self.begin()?;
        Ok(ReadGuard { handle: self, side })
    }
}

impl<K, V, A> Drop for ReadHandle<K, V, A> {
    fn drop(&mut self) {
        if !self.registered {
            return;
        }
        // Leave first so a flush waiting on this reader can finish and give
        // up the writer lock.
        if self.live.is_some() {
            self.exit();
        }
        self.shared.lock().registry.deregister(self.slot.id());
        debug!(reader = %self.slot.id(), "dropped reader");
    }
}

impl<K, V, A> std::fmt::Debug for ReadHandle<K, V, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadHandle")
            .field("id", &self.slot.id())
            .field("epoch", &self.slot.epoch())
            .field("live", &self.live)
            .field("registered", &self.registered)
            .finish()
    }
}

/// RAII guard for a read section.
pub struct ReadGuard<'a, K, V, A = HashMap<K, V>> {
    handle: &'a mut ReadHandle<K, V, A>,
    side: ArenaSide,
}

impl<K, V, A> ReadGuard<'_, K, V, A>
where
    A: Arena<K, V>,
{
    #[inline(always)]
    fn arena(&self) -> &A {
        // SAFETY: the guard keeps the section open until it drops.
        unsafe { self.handle.shared.read_arena(self.side) }
    }

    /// Returns the arena this section reads from.
    pub fn side(&self) -> ArenaSide {
        self.side
    }

    /// Looks up a key.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.arena().get(key)
    }

    /// Looks up a key, falling back to `V::default()`.
    pub fn get_or_default(&self, key: &K) -> V
    where
        V: Clone + Default,
    {
        self.get(key).cloned().unwrap_or_default()
    }

    /// Returns true if the key is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.arena().len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.arena().is_empty()
    }

    /// Visits every entry until the function returns false.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.arena().for_each(f)
    }
}

impl<K, V, A> Drop for ReadGuard<'_, K, V, A> {
    fn drop(&mut self) {
        self.handle.exit();
    }
}
