//! Persisted bot state
//!
//! A single Fjall partition holds the two pieces of state that outlive a
//! process: the sync cursor written after every sync cycle, and the list of
//! room participants maintained from membership events. Queued jobs are
//! not persisted.

pub mod error;
pub mod keys;
pub mod store;

pub use error::{Result, StateError};
pub use store::StateStore;
