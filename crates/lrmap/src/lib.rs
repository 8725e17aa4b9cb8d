//! Left-right concurrent map.
//!
//! This crate provides a key-value map for read-heavy workloads:
//! - Readers never block and never take a lock
//! - Writers serialize on a single lock and batch writes until a flush
//! - Two arenas, one exposed to readers and one written to, swapped on flush
//! - Per-reader epoch counters to detect when the stale arena is free again
//!
//! ```
//! use lrmap::LeftRightMap;
//!
//! let map = LeftRightMap::new();
//! for i in 0..10 {
//!     map.set(i, i * i)?;
//! }
//! map.flush()?;
//!
//! let mut reader = map.new_reader()?;
//! reader.enter()?;
//! assert_eq!(reader.get(&3)?, Some(&9));
//! reader.leave()?;
//! # Ok::<(), lrmap::LrMapError>(())
//! ```

mod arena;
mod designator;
mod map;
mod oplog;
mod reader;
mod registry;
mod slot;

pub use arena::Arena;
pub use designator::ArenaSide;
pub use lrmap_common::{BackoffConfig, LrMapError, MapConfig, Result};
pub use map::{FlushReport, LeftRightMap, MapStats};
pub use reader::{ReadGuard, ReadHandle};
pub use slot::ReaderId;
