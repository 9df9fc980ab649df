//! Persisted guard state
//!
//! The chain ledger and circuit breaker keep their history behind the
//! [`StateStore`] trait so the decision logic never touches the filesystem
//! directly. [`JsonFileStore`] is the production store shared between
//! processes; [`MemoryStore`] backs tests and embedded use.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::Result;

/// A single persisted document of type `T`
pub trait StateStore<T> {
    /// Read the current state
    ///
    /// A store that has never been written yields `T::default()`. Unreadable
    /// or invalid contents are reported as [`crate::Error::StateCorrupt`] so
    /// callers can decide how to degrade.
    fn load(&self) -> Result<T>;

    /// Read-modify-write the state as one atomic step
    ///
    /// Corrupt contents are replaced by `T::default()` before `apply` runs.
    fn update<R>(&self, apply: impl FnOnce(&mut T) -> R) -> Result<R>;
}
