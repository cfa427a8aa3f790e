//! In-memory cache policy.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{EntryCache, EntryStream};
use crate::error::Result;

/// Cache policy that retains each stream in memory.
///
/// `get` removes and returns the stored stream, so an entry can be read
/// once per `put`. This keeps the policy zero-copy: nothing is drained or
/// duplicated on the way in or out.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, EntryStream>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache::default()
    }
}

impl EntryCache for MemoryCache {
    fn put(&self, name: &str, stream: EntryStream) -> Result<()> {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(name.to_string(), stream);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<EntryStream>> {
        // Single-use: handing the stream over removes the entry.
        Ok(self
            .entries
            .write()
            .expect("cache lock poisoned")
            .remove(name))
    }

    fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .contains_key(name)
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(name);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().expect("cache lock poisoned").clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::*;

    fn stream(bytes: &[u8]) -> EntryStream {
        Box::new(Cursor::new(bytes.to_vec()))
    }

    fn drain(mut stream: EntryStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn get_is_single_use() {
        let cache = MemoryCache::new();
        cache.put("a.txt", stream(b"alpha")).unwrap();

        assert!(cache.contains("a.txt"));
        assert_eq!(drain(cache.get("a.txt").unwrap().unwrap()), b"alpha");
        assert!(!cache.contains("a.txt"));
        assert!(cache.get("a.txt").unwrap().is_none());
    }

    #[test]
    fn put_replaces_previous_entry() {
        let cache = MemoryCache::new();
        cache.put("a.txt", stream(b"old")).unwrap();
        cache.put("a.txt", stream(b"new")).unwrap();
        assert_eq!(drain(cache.get("a.txt").unwrap().unwrap()), b"new");
    }

    #[test]
    fn remove_and_clear_drop_entries() {
        let cache = MemoryCache::new();
        cache.put("a.txt", stream(b"alpha")).unwrap();
        cache.put("b.txt", stream(b"beta")).unwrap();

        cache.remove("a.txt").unwrap();
        assert!(!cache.contains("a.txt"));
        assert!(cache.contains("b.txt"));

        cache.clear().unwrap();
        assert!(!cache.contains("b.txt"));
    }
}
