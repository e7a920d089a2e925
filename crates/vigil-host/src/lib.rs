//! Host action interfaces for vigil
//!
//! This crate defines the two callback sinks the budget engine drives
//! (announcing the remaining time, restricting the device) together with
//! command-backed implementations, a log-only announcer, and a recording mock.

mod command;
mod mock;
mod phrase;
mod traits;

pub use command::*;
pub use mock::*;
pub use phrase::*;
pub use traits::*;
