//! Local filesystem source with random access support.
//!
//! Implements [`RangeSource`] over a read-only file handle using
//! platform-specific positioned reads.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{ByteRange, RangeSource};
use crate::error::{Error, Result};

/// Local file source with random access support.
///
/// The file is opened read-only at construction and its size cached. Reads
/// use `pread(2)` on Unix (positioned, without touching the shared file
/// offset) and seek + read elsewhere.
///
/// ## Example
///
/// ```no_run
/// use std::path::Path;
/// use remotezip::FileSource;
///
/// # fn main() -> remotezip::Result<()> {
/// let source = FileSource::open(Path::new("archive.zip"))?;
/// println!("File size: {} bytes", source.len());
/// # Ok(())
/// # }
/// ```
pub struct FileSource {
    /// The underlying handle; `None` once the source has been closed.
    file: RwLock<Option<File>>,
    /// Cached file size in bytes.
    len: u64,
}

impl FileSource {
    /// Open the file at `path` read-only and cache its size.
    ///
    /// # Errors
    ///
    /// Fails if the file doesn't exist, can't be opened, or its metadata
    /// can't be read.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(FileSource {
            file: RwLock::new(Some(file)),
            len,
        })
    }

    /// Total size of the file in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True for a zero-length file.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fill `buf` from `offset`, failing with `UnexpectedEof` if the file
    /// ends first.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let guard = self.file.read().expect("file lock poisoned");
        let file = guard.as_ref().ok_or(Error::Closed)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            file.read_exact_at(buf, offset)?;
        }

        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = file;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(buf)?;
        }

        Ok(())
    }
}

#[async_trait]
impl RangeSource for FileSource {
    async fn read(&self, range: ByteRange) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; range.length as usize];
        self.read_exact_at(range.start, &mut buf)?;
        Ok(buf)
    }

    async fn read_many(&self, ranges: &[ByteRange]) -> Result<Vec<Vec<u8>>> {
        let mut parts = Vec::with_capacity(ranges.len());
        for range in ranges {
            parts.push(self.read(*range).await?);
        }
        Ok(parts)
    }

    async fn read_tail(&self, n: u64) -> Result<Vec<u8>> {
        if n > self.len {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("tail of {n} bytes requested from a {}-byte file", self.len),
            )));
        }
        self.read(ByteRange::new(self.len - n, n)).await
    }

    async fn close(&self) -> Result<()> {
        // Dropping the handle releases it; later reads observe `None`.
        self.file.write().expect("file lock poisoned").take();
        Ok(())
    }
}
