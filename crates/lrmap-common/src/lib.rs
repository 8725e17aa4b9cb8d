//! lrmap common errors and configuration.
//!
//! This crate provides shared definitions used by the left-right map crates.

pub mod config;
pub mod error;

pub use config::{BackoffConfig, MapConfig};
pub use error::{LrMapError, Result};
