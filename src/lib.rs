#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// A keyed `HashMap` built on the core table.
///
/// This module wraps the `HashTable` with a configurable `BuildHasher`
/// and the usual keyed map interface.
pub mod hash_map;

pub mod hash_table;

/// Fixed-capacity uninitialized slot storage.
///
/// This module provides the raw buffer the hash table places elements into.
/// Elements are never constructed or destructed automatically; the table's
/// metadata array is the sole authority on which slots are live.
pub mod raw_slots;

pub use hash_map::HashMap;
pub use hash_table::Entry;
pub use hash_table::HashTable;
pub use raw_slots::RawSlots;

/// Errors returned by the fallible map and table operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested key is not present in the map.
    ///
    /// Returned by [`HashMap::at`] and [`HashMap::at_mut`]. Lookup methods
    /// like [`HashMap::get`] report absence through `Option` instead.
    KeyNotFound,
    /// The allocator could not provide memory for construction or growth.
    ///
    /// When returned from a `try_*` growth operation, the original table is
    /// left valid and unmodified.
    OutOfMemory,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::KeyNotFound => f.write_str("key not found"),
            Error::OutOfMemory => f.write_str("allocation failed"),
        }
    }
}

impl core::error::Error for Error {}
