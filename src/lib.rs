#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// The general map dialect.
///
/// This module provides a [`HashMap`] over the core [`HashTable`] where
/// keys are hashed through a configurable `BuildHasher` and compared with a
/// pluggable [`KeyEq`] comparator.
pub mod hash_map;

pub mod hash_table;

/// The numeric map dialect.
///
/// This module provides an [`IntMap`] over the core [`HashTable`] for
/// integer keys of at most 32 bits, hashed by identity and compared by
/// hash.
pub mod int_map;

pub use hash_map::HashMap;
pub use hash_map::HashedQuery;
pub use hash_map::KeyEq;
pub use hash_map::StructuralEq;
pub use hash_table::HashTable;
pub use hash_table::KeyNotFound;
pub use hash_table::KeyQuery;
pub use int_map::IntKey;
pub use int_map::IntMap;
pub use int_map::IntQuery;
