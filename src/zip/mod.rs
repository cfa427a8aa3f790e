//! ZIP archive parsing and reading.
//!
//! This module is organized into three layers:
//!
//! - [`records`] (+ [`extra`]): typed parsers for each ZIP structure
//! - [`directory`]: the trailer-scan algorithm that materializes the
//!   Central Directory map, promoting ZIP32 to ZIP64 when sentinel values
//!   demand it
//! - [`reader`]: the consumer-facing [`ZipReader`](reader::ZipReader) with
//!   its cache-backed extraction pipeline
//!
//! ## Reading strategy
//!
//! ZIP files are designed to be read from the end: the trailer points at
//! the Central Directory, which carries everything needed to locate and
//! size each entry. Listing an archive therefore costs at most three reads,
//! and extracting any subset of entries costs one more, which is what
//! makes the format a good fit for HTTP Range requests.
//!
//! ## Supported features
//!
//! - Standard ZIP and ZIP64 archives (including the AppX subtype)
//! - STORED and DEFLATE compression methods
//! - UTF-8 (bit 11) and CP437 entry names
//! - Data-descriptor entries (sizes taken from the Central Directory)
//! - ZIP64 extended information and extended timestamp extra fields
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No archive comments (the trailer is expected at the very end)

pub(crate) mod directory;
pub mod extra;
pub mod records;
pub mod reader;

pub use extra::{ExtendedTimestamp, GenericExtraField, Zip64ExtraField, ZipExtraField};
pub use reader::{FileMetadata, ZipReader};
pub use records::{CompressionMethod, EndOfDirectory, LocalFileHeader, Zip64Locator, ZipEntry};
