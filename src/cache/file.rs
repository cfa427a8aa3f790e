//! File-backed cache policy.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::sync::RwLock;

use log::{debug, warn};

use super::{EntryCache, EntryStream};
use crate::error::Result;

/// Cache policy that drains each stream into a temporary file.
///
/// `get` opens a fresh reader over the retained file, so a cached entry can
/// be read any number of times. Temp files live in the process temp
/// directory, named after the entry (`/` replaced by `-`) with a `.tmp`
/// suffix, and are deleted on `remove`, `clear`, or reader close.
#[derive(Default)]
pub struct FileCache {
    entries: RwLock<HashMap<String, PathBuf>>,
}

impl FileCache {
    pub fn new() -> Self {
        FileCache::default()
    }

    /// Write the stream out to a uniquely-named temp file.
    fn persist(name: &str, mut stream: EntryStream) -> io::Result<PathBuf> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", name.replace('/', "-")))
            .suffix(".tmp")
            .tempfile()?;
        io::copy(&mut stream, &mut file)?;
        // Detach the file from the handle so it outlives this call.
        let (_, path) = file.keep().map_err(|e| e.error)?;
        debug!("cached {name} at {}", path.display());
        Ok(path)
    }
}

impl EntryCache for FileCache {
    fn put(&self, name: &str, stream: EntryStream) -> Result<()> {
        let path = Self::persist(name, stream)?;
        let previous = self
            .entries
            .write()
            .expect("cache lock poisoned")
            .insert(name.to_string(), path);
        if let Some(stale) = previous {
            let _ = fs::remove_file(stale);
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<EntryStream>> {
        let path = self
            .entries
            .read()
            .expect("cache lock poisoned")
            .get(name)
            .cloned();
        match path {
            Some(path) => {
                let file = File::open(path)?;
                Ok(Some(Box::new(file)))
            }
            None => Ok(None),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .contains_key(name)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        if let Some(path) = entries.remove(name) {
            // Best-effort delete; keep the mapping alive when it fails so
            // the file can still be reached and reaped later.
            if let Err(e) = fs::remove_file(&path) {
                warn!("could not delete cached file {}: {e}", path.display());
                entries.insert(name.to_string(), path);
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        for (name, path) in entries.drain() {
            if let Err(e) = fs::remove_file(&path) {
                warn!(
                    "could not delete cached file {} for {name}: {e}",
                    path.display()
                );
            }
        }
        Ok(())
    }
}
