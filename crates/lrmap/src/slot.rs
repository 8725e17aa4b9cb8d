//! Per-reader epoch slot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a registered reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(pub u64);

impl std::fmt::Display for ReaderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reader:{}", self.0)
    }
}

/// Returns true if `epoch` marks a reader inside a read section.
#[inline(always)]
pub fn is_inside(epoch: u64) -> bool {
    epoch & 1 == 1
}

/// Shared state of one reader, visible to the writer through the registry.
///
/// The epoch starts even and is bumped by one on every enter and every
/// leave, so it is odd exactly while the reader holds an arena snapshot.
/// The counter wraps on overflow; parity survives the wrap because
/// `u64::MAX` is odd and `0` is even.
pub struct ReaderSlot {
    /// Reader identifier.
    id: ReaderId,
    /// Enter/leave counter.
    epoch: AtomicU64,
}

impl ReaderSlot {
    /// Creates a slot outside any read section.
    pub fn new(id: ReaderId) -> Self {
        Self::with_epoch(id, 0)
    }

    pub(crate) fn with_epoch(id: ReaderId, epoch: u64) -> Self {
        Self {
            id,
            epoch: AtomicU64::new(epoch),
        }
    }

    /// Returns the reader ID.
    #[inline]
    pub fn id(&self) -> ReaderId {
        self.id
    }

    /// Returns the current epoch.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Returns true if the reader is inside a read section.
    #[inline]
    pub fn is_inside(&self) -> bool {
        is_inside(self.epoch())
    }

    /// Marks the start of a read section. Returns the new (odd) epoch.
    ///
    /// Must be ordered before the reader's designator load, hence SeqCst.
    #[inline]
    pub(crate) fn enter(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Marks the end of a read section. Returns the new (even) epoch.
    ///
    /// Release orders every arena read of the section before the bump.
    #[inline]
    pub(crate) fn leave(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::Release).wrapping_add(1)
    }
}

impl std::fmt::Debug for ReaderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSlot")
            .field("id", &self.id)
            .field("epoch", &self.epoch())
            .field("inside", &self.is_inside())
            .finish()
    }
}
