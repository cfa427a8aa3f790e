//! Caching of decompressed entry bodies.
//!
//! The extraction pipeline pushes every inflated entry through a cache so
//! repeated reads don't re-fetch from the byte source. Two interchangeable
//! policies implement the [`EntryCache`] capability:
//!
//! - [`MemoryCache`] stores the stream itself; `get` removes it, so each
//!   cached stream can be consumed **once** per `put`.
//! - [`FileCache`] drains the stream into a temporary file; `get` opens a
//!   fresh reader each time, so cached entries are **replayable**.
//!
//! Both are internally synchronized with a read/write lock so a shared
//! reader can consult them from several tasks.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use std::io::Read;

use crate::error::Result;

/// A consumer-facing stream of uncompressed entry bytes.
pub type EntryStream = Box<dyn Read + Send + Sync>;

/// Capability set for a decompressed-entry cache, keyed by entry name.
pub trait EntryCache: Send + Sync {
    /// Store the stream for `name`, replacing any previous entry.
    fn put(&self, name: &str, stream: EntryStream) -> Result<()>;

    /// Retrieve the stream for `name`, or `None` when absent.
    ///
    /// Whether the entry survives the call is policy-dependent: the memory
    /// policy hands over the stored stream (removing it), the file policy
    /// opens a fresh reader over the retained temp file.
    fn get(&self, name: &str) -> Result<Option<EntryStream>>;

    /// True when `name` is currently cached.
    fn contains(&self, name: &str) -> bool;

    /// Drop the entry for `name`, releasing its backing storage.
    fn remove(&self, name: &str) -> Result<()>;

    /// Drop every entry and release all backing storage.
    fn clear(&self) -> Result<()>;
}
