//! # Storage Engine
//!
//! The in-memory keyspace behind the server: a Robin Hood open-addressed
//! table as the primary index, typed value entries with absolute-millisecond
//! expiration, byte-level memory accounting, approximate-LRU eviction, and a
//! binary snapshot format.
//!
//! Everything here is single-writer. The server wraps the [`Store`] in one
//! mutex; nothing in this crate blocks or spawns.

pub mod eviction;
pub mod seqlist;
pub mod snapshot;
pub mod store;
pub mod table;
pub mod value;

pub use seqlist::SeqList;
pub use store::Store;
pub use table::HashTable;
pub use value::{Entry, Value, ValueKind};
