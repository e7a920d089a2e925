//! Shared utilities for vigil
//!
//! This crate provides:
//! - Wall-clock time with a debug-build mock override
//! - The [`Clock`] abstraction with system and lock-step implementations
//! - Duration formatting helpers
//! - Error types
//! - Default paths for config, data, and runtime files

mod clock;
mod error;
mod lockstep;
mod paths;
mod time;

pub use clock::*;
pub use error::*;
pub use lockstep::*;
pub use paths::*;
pub use time::*;
