//! # remotezip
//!
//! A random-access reader for ZIP archives (including ZIP64 and the AppX
//! subtype), able to enumerate entries and extract a selected subset
//! without materializing the whole archive.
//!
//! The backing byte source can be a local seekable file or a remote HTTP
//! resource queried through byte-range requests. Selective extraction over
//! HTTP translates into a single multi-range request answered with a
//! `multipart/byteranges` response; the reader parses the response
//! piecewise and inflates each entry on demand, pushing the results
//! through a cache.
//!
//! ## Features
//!
//! - List and extract from local ZIP files or HTTP/HTTPS URLs
//! - ZIP64 support (archives larger than 4 GiB or with more than 65,535
//!   entries)
//! - STORED (uncompressed) and DEFLATE compression methods
//! - One multi-range request per extraction batch for remote archives
//! - Pluggable caching of decompressed entries: in-memory or file-backed
//!
//! ## Example
//!
//! ```no_run
//! use remotezip::{HttpSource, MemoryCache, ZipReader};
//!
//! #[tokio::main]
//! async fn main() -> remotezip::Result<()> {
//!     // Open a remote ZIP archive.
//!     let source = HttpSource::new("https://example.com/archive.zip".to_string()).await?;
//!     let reader = ZipReader::open(source, MemoryCache::new()).await?;
//!
//!     // List all entries.
//!     for name in reader.files() {
//!         println!("{name}");
//!     }
//!
//!     // Fetch two entries with a single HTTP request, then read them
//!     // back from the cache.
//!     reader.cache_files(&["docs/intro.md", "LICENSE"]).await?;
//!     let mut stream = reader.file_stream("LICENSE").await?;
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cache::{EntryCache, EntryStream, FileCache, MemoryCache};
pub use cli::Cli;
pub use error::{Error, RecordCause, RecordError, Result};
pub use io::{ByteRange, FileSource, HttpSource, RangeSource};
pub use zip::{FileMetadata, ZipEntry, ZipReader};
