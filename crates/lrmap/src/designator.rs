//! Atomic indicator of which arena is exposed to readers.

use lrmap_common::{LrMapError, Result};
use std::sync::atomic::{AtomicU8, Ordering};

/// One of the two arenas of a left-right map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ArenaSide {
    Left = 0,
    Right = 1,
}

impl ArenaSide {
    /// Returns the opposite arena.
    #[inline(always)]
    pub fn other(self) -> Self {
        match self {
            ArenaSide::Left => ArenaSide::Right,
            ArenaSide::Right => ArenaSide::Left,
        }
    }

    /// Returns the arena's slot in a two-element array.
    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for ArenaSide {
    type Error = LrMapError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ArenaSide::Left),
            1 => Ok(ArenaSide::Right),
            _ => Err(LrMapError::CorruptDesignator(value)),
        }
    }
}

impl std::fmt::Display for ArenaSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArenaSide::Left => f.write_str("left"),
            ArenaSide::Right => f.write_str("right"),
        }
    }
}

/// The read-side designator.
///
/// Loads and stores are sequentially consistent. A reader bumps its epoch
/// and then loads the designator, the writer stores the designator and then
/// loads every epoch. Total order over those four accesses guarantees the
/// writer either sees the odd epoch or the reader sees the new side.
pub(crate) struct Designator(AtomicU8);

/// Raw value stored once the map is poisoned. Never a valid side.
const POISONED: u8 = u8::MAX;

impl Designator {
    pub(crate) fn new(side: ArenaSide) -> Self {
        Self(AtomicU8::new(side as u8))
    }

    /// Returns the side readers should use.
    #[inline(always)]
    pub(crate) fn load(&self) -> Result<ArenaSide> {
        match self.0.load(Ordering::SeqCst) {
            POISONED => Err(LrMapError::Poisoned),
            raw => ArenaSide::try_from(raw),
        }
    }

    /// Exposes `side` to every reader that enters from now on.
    #[inline]
    pub(crate) fn publish(&self, side: ArenaSide) {
        self.0.store(side as u8, Ordering::SeqCst);
    }

    /// Makes every later `load` fail, so no new read section can start.
    #[inline]
    pub(crate) fn poison(&self) {
        self.0.store(POISONED, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn store_raw(&self, raw: u8) {
        self.0.store(raw, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Designator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Designator")
            .field(&self.0.load(Ordering::Relaxed))
            .finish()
    }
}
