//! High-level archive reading API.
//!
//! [`ZipReader`] owns a byte source, the parsed directory map, and a cache
//! of decompressed entries. Bulk extraction coalesces all requested entries
//! into byte ranges and fetches them with a single `read_many` call. For an
//! HTTP source that is one multi-range request per batch.
//!
//! ## Example
//!
//! ```no_run
//! use remotezip::{HttpSource, MemoryCache, ZipReader};
//!
//! # async fn example() -> remotezip::Result<()> {
//! let source = HttpSource::new("https://example.com/archive.zip".to_string()).await?;
//! let reader = ZipReader::open(source, MemoryCache::new()).await?;
//!
//! for name in reader.files() {
//!     println!("{name}");
//! }
//!
//! let mut stream = reader.file_stream("README.md").await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::io::{self, Cursor};

use chrono::NaiveDateTime;
use flate2::read::DeflateDecoder;
use log::debug;

use super::directory;
use super::records::{CompressionMethod, LFH_SIZE, LocalFileHeader, ZipEntry};
use crate::cache::{EntryCache, EntryStream};
use crate::error::{Error, Result};
use crate::io::{ByteRange, RangeSource};

/// Consumer-visible metadata for one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub last_modified: NaiveDateTime,
    pub last_access: Option<NaiveDateTime>,
    pub creation: Option<NaiveDateTime>,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
}

/// Random-access ZIP archive reader.
///
/// Construction parses the archive trailer and Central Directory; the
/// directory map is immutable from then on. The reader is generic over its
/// byte source (local file or ranged HTTP) and its cache policy (memory or
/// file-backed); see the crate docs for the trade-offs.
pub struct ZipReader<S, C> {
    source: S,
    directory: HashMap<String, ZipEntry>,
    cache: C,
}

impl<S: RangeSource, C: EntryCache> ZipReader<S, C> {
    /// Open an archive: parse the trailer and materialize the directory.
    pub async fn open(source: S, cache: C) -> Result<Self> {
        let directory = directory::load(&source).await?;
        Ok(ZipReader {
            source,
            directory,
            cache,
        })
    }

    /// Names of all entries in the archive, in no particular order.
    pub fn files(&self) -> Vec<&str> {
        self.directory.keys().map(String::as_str).collect()
    }

    /// The parsed Central Directory entry for `name`.
    pub fn entry(&self, name: &str) -> Result<&ZipEntry> {
        self.directory
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Metadata for one entry.
    pub fn file_metadata(&self, name: &str) -> Result<FileMetadata> {
        let entry = self.entry(name)?;
        Ok(FileMetadata {
            name: entry.file_name.clone(),
            last_modified: entry.last_modified,
            last_access: entry.last_access,
            creation: entry.created,
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
            crc32: entry.crc32,
        })
    }

    /// A stream over the uncompressed bytes of one entry.
    ///
    /// Served from the cache when possible, fetching otherwise. Under the
    /// memory cache policy the returned stream consumes the cached entry, so
    /// each call past the first re-fetches; the file cache replays freely.
    pub async fn file_stream(&self, name: &str) -> Result<EntryStream> {
        let entry = self.entry(name)?;
        if !self.cache.contains(name) {
            self.fetch(&[entry]).await?;
        }
        self.cache
            .get(name)?
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Streams for several entries, in the order the names were given.
    ///
    /// All cache misses are fetched together with a single bulk read.
    pub async fn file_streams(&self, names: &[&str]) -> Result<Vec<(String, EntryStream)>> {
        if !names.is_empty() {
            self.cache_files(names).await?;
        }
        let mut streams = Vec::with_capacity(names.len());
        for name in names {
            let stream = self
                .cache
                .get(name)?
                .ok_or_else(|| Error::NotFound(name.to_string()))?;
            streams.push((name.to_string(), stream));
        }
        Ok(streams)
    }

    /// Force-fetch and inflate the named entries into the cache.
    ///
    /// Entries already cached are skipped; the remaining misses are fetched
    /// with one bulk read. Calling this again with the same names performs
    /// no further I/O.
    ///
    /// # Errors
    ///
    /// An empty `names` list is a programming error and fails with
    /// [`Error::Precondition`]; any unknown name fails with
    /// [`Error::NotFound`] before anything is fetched.
    pub async fn cache_files(&self, names: &[&str]) -> Result<()> {
        if names.is_empty() {
            return Err(Error::Precondition(
                "cache_files requires at least one entry name",
            ));
        }
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            entries.push(self.entry(name)?);
        }
        entries.retain(|e| !self.cache.contains(&e.file_name));
        if entries.is_empty() {
            return Ok(());
        }
        self.fetch(&entries).await
    }

    /// Fetch the given entries with one bulk read and push each through the
    /// cache.
    async fn fetch(&self, entries: &[&ZipEntry]) -> Result<()> {
        let ranges: Vec<ByteRange> = entries.iter().map(|e| entry_range(e)).collect();
        debug!("fetching {} entries with one bulk read", entries.len());

        let parts = self.source.read_many(&ranges).await?;
        if parts.len() != ranges.len() {
            return Err(Error::Io(io::Error::other(format!(
                "requested {} ranges, source returned {} parts",
                ranges.len(),
                parts.len()
            ))));
        }

        for (entry, part) in entries.iter().zip(parts) {
            let mut cursor = Cursor::new(part.as_slice());
            let header = LocalFileHeader::parse(&mut cursor, &self.directory)?;

            let payload_start = cursor.position() as usize;
            let payload_end = payload_start + header.compressed_size as usize;
            if part.len() < payload_end {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "entry {} needs {} payload bytes, part holds {}",
                        header.file_name,
                        header.compressed_size,
                        part.len() - payload_start
                    ),
                )));
            }
            let payload = part[payload_start..payload_end].to_vec();

            let stream: EntryStream = match header.compression_method {
                CompressionMethod::Stored => Box::new(Cursor::new(payload)),
                // ZIP carries raw deflate, without a zlib wrapper.
                CompressionMethod::Deflate => Box::new(DeflateDecoder::new(Cursor::new(payload))),
            };
            self.cache.put(&entry.file_name, stream)?;
        }
        Ok(())
    }

    /// Release the byte source and clear the cache.
    ///
    /// Consumes the reader; the directory map is dropped with it.
    pub async fn close(self) -> Result<()> {
        self.source.close().await?;
        self.cache.clear()
    }
}

/// The byte range covering one entry: its Local File Header (fixed part
/// plus name, never an extra field) followed by the compressed payload. A
/// trailing data descriptor, when present, is deliberately left out.
fn entry_range(entry: &ZipEntry) -> ByteRange {
    ByteRange::new(
        entry.local_header_offset,
        LFH_SIZE + entry.file_name_len as u64 + entry.compressed_size,
    )
}
