#![deny(missing_docs)]
//! `filedict`: an embedded, append-mostly, single-file persistent mapping
//! from string keys to JSON-serializable values, with an ordered-sequence
//! [`List`] view over the same on-disk format.
//!
//! The file is crash-safe without a separate write-ahead log: every
//! write shadow-writes the new record as a tombstone first, then
//! "commits" it with a single atomic byte write. See [`Dict`] for the
//! mapping surface and [`List`] for the sequence surface.

pub mod args;
mod cache;
mod codec;
mod dict;
mod engine;
mod error;
mod free_space;
mod list;

pub use dict::Dict;
pub use engine::{Durability, Iter as DictIter};
pub use error::{FileDictError, Result};
pub use list::{Iter as ListIter, List};
