//! Budget state model and scheduling engine for vigil
//!
//! This crate is the heart of vigil, containing:
//! - The persisted [`BudgetState`] record and its on-disk format
//! - The per-tick decision table ([`plan_tick`]): reset, expiry, sleep, readout
//! - [`StateFile`], the load/save helper over a record store
//! - [`BudgetEngine`], the cancellable background loop

mod engine;
mod persist;
mod schedule;
mod state;

pub use engine::*;
pub use persist::*;
pub use schedule::*;
pub use state::*;
