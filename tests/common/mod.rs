//! Shared test support: a programmatic ZIP writer for fixtures and an
//! in-memory byte source with fetch accounting.
#![allow(dead_code)]

use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use remotezip::{ByteRange, Error, RangeSource, Result};

/// DOS-encoded 13:25:26, paired with [`DOS_DATE`].
pub const DOS_TIME: u16 = 0x6B2D;
/// DOS-encoded 2025-04-15.
pub const DOS_DATE: u16 = 0x5A8F;

const LFH_SIGNATURE: u32 = 0x04034B50;
const CFH_SIGNATURE: u32 = 0x02014B50;
const EOCD32_SIGNATURE: u32 = 0x06054B50;
const EOCD64_SIGNATURE: u32 = 0x06064B50;
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x07064B50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074B50;

const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const FLAG_UTF8: u16 = 1 << 11;

struct EntrySpec {
    name: String,
    data: Vec<u8>,
    method: u16,
    data_descriptor: bool,
    zip64: bool,
    times: Option<(u32, u32, u32)>,
}

/// Builds ZIP archives byte-by-byte for the reader to chew on.
///
/// Every entry gets a Local File Header with no extra field, followed by
/// its payload (and a data descriptor when requested); the Central
/// Directory carries the ZIP64 and extended-timestamp extra fields.
#[derive(Default)]
pub struct ArchiveBuilder {
    entries: Vec<EntrySpec>,
    zip64_trailer: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        ArchiveBuilder::default()
    }

    /// Add a DEFLATE-compressed file.
    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, 8, false, false, None)
    }

    /// Add an uncompressed (STORED) file.
    pub fn stored_file(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, 0, false, false, None)
    }

    /// Add a directory entry (name must end with `/`).
    pub fn dir(self, name: &str) -> Self {
        assert!(name.ends_with('/'), "directory names end with /");
        self.push(name, b"", 0, false, false, None)
    }

    /// Add a DEFLATE file written in data-descriptor style: zeroed sizes
    /// and CRC in the Local File Header, real values in the Central
    /// Directory and in a descriptor block trailing the payload.
    pub fn descriptor_file(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, 8, true, false, None)
    }

    /// Add a DEFLATE file whose Central Directory entry stores sentinel
    /// 32-bit sizes/offset and carries the real values in a ZIP64 extra
    /// field.
    pub fn zip64_file(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, 8, false, true, None)
    }

    /// Add a DEFLATE file with an extended-timestamp extra field carrying
    /// modify/access/create epoch seconds.
    pub fn timestamped_file(
        self,
        name: &str,
        data: &[u8],
        modified: u32,
        accessed: u32,
        created: u32,
    ) -> Self {
        self.push(name, data, 8, false, false, Some((modified, accessed, created)))
    }

    /// Emit a ZIP64 trailer: sentinel values in the ZIP32 record, real
    /// values in the ZIP64 record reached through the locator.
    pub fn zip64_trailer(mut self) -> Self {
        self.zip64_trailer = true;
        self
    }

    fn push(
        mut self,
        name: &str,
        data: &[u8],
        method: u16,
        data_descriptor: bool,
        zip64: bool,
        times: Option<(u32, u32, u32)>,
    ) -> Self {
        self.entries.push(EntrySpec {
            name: name.to_string(),
            data: data.to_vec(),
            method,
            data_descriptor,
            zip64,
            times,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cd = Vec::new();

        for entry in &self.entries {
            let lfh_offset = out.len() as u64;
            let crc = crc32fast::hash(&entry.data);
            let compressed = match entry.method {
                0 => entry.data.clone(),
                8 => deflate(&entry.data),
                other => panic!("unsupported method {other}"),
            };
            let mut flags = 0u16;
            if entry.data_descriptor {
                flags |= FLAG_DATA_DESCRIPTOR;
            }
            if !entry.name.is_ascii() {
                flags |= FLAG_UTF8;
            }
            let version = if entry.zip64 { 45 } else { 20 };

            // Local file header: never an extra field.
            put_u32(&mut out, LFH_SIGNATURE);
            put_u16(&mut out, version);
            put_u16(&mut out, flags);
            put_u16(&mut out, entry.method);
            put_u16(&mut out, DOS_TIME);
            put_u16(&mut out, DOS_DATE);
            if entry.data_descriptor {
                put_u32(&mut out, 0);
                put_u32(&mut out, 0);
                put_u32(&mut out, 0);
            } else {
                put_u32(&mut out, crc);
                put_u32(&mut out, compressed.len() as u32);
                put_u32(&mut out, entry.data.len() as u32);
            }
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, 0);
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&compressed);

            if entry.data_descriptor {
                put_u32(&mut out, DATA_DESCRIPTOR_SIGNATURE);
                put_u32(&mut out, crc);
                put_u32(&mut out, compressed.len() as u32);
                put_u32(&mut out, entry.data.len() as u32);
            }

            // Central directory entry, with extra fields as requested.
            let mut extra = Vec::new();
            if entry.zip64 {
                put_u16(&mut extra, 0x0001);
                put_u16(&mut extra, 28);
                put_u64(&mut extra, entry.data.len() as u64);
                put_u64(&mut extra, compressed.len() as u64);
                put_u64(&mut extra, lfh_offset);
                put_u32(&mut extra, 0);
            }
            if let Some((modified, accessed, created)) = entry.times {
                put_u16(&mut extra, 0x5455);
                put_u16(&mut extra, 13);
                extra.push(0b111);
                put_u32(&mut extra, modified);
                put_u32(&mut extra, accessed);
                put_u32(&mut extra, created);
            }

            put_u32(&mut cd, CFH_SIGNATURE);
            put_u16(&mut cd, version); // version made by
            put_u16(&mut cd, version);
            put_u16(&mut cd, flags);
            put_u16(&mut cd, entry.method);
            put_u16(&mut cd, DOS_TIME);
            put_u16(&mut cd, DOS_DATE);
            put_u32(&mut cd, crc);
            if entry.zip64 {
                put_u32(&mut cd, u32::MAX);
                put_u32(&mut cd, u32::MAX);
            } else {
                put_u32(&mut cd, compressed.len() as u32);
                put_u32(&mut cd, entry.data.len() as u32);
            }
            put_u16(&mut cd, entry.name.len() as u16);
            put_u16(&mut cd, extra.len() as u16);
            put_u16(&mut cd, 0); // comment
            put_u16(&mut cd, 0); // start disk
            put_u16(&mut cd, 0); // internal attributes
            put_u32(&mut cd, 0); // external attributes
            if entry.zip64 {
                put_u32(&mut cd, u32::MAX);
            } else {
                put_u32(&mut cd, lfh_offset as u32);
            }
            cd.extend_from_slice(entry.name.as_bytes());
            cd.extend_from_slice(&extra);
        }

        let cd_offset = out.len() as u64;
        let cd_size = cd.len() as u64;
        let entry_count = self.entries.len() as u64;
        out.extend_from_slice(&cd);

        if self.zip64_trailer {
            let eocd64_offset = out.len() as u64;
            put_u32(&mut out, EOCD64_SIGNATURE);
            put_u64(&mut out, 44);
            put_u16(&mut out, 45); // version made by
            put_u16(&mut out, 45); // version needed
            put_u32(&mut out, 0); // disk
            put_u32(&mut out, 0); // start disk
            put_u64(&mut out, entry_count);
            put_u64(&mut out, entry_count);
            put_u64(&mut out, cd_size);
            put_u64(&mut out, cd_offset);

            put_u32(&mut out, ZIP64_LOCATOR_SIGNATURE);
            put_u32(&mut out, 0);
            put_u64(&mut out, eocd64_offset);
            put_u32(&mut out, 1);

            put_u32(&mut out, EOCD32_SIGNATURE);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0xFFFF);
            put_u16(&mut out, 0xFFFF);
            put_u32(&mut out, u32::MAX);
            put_u32(&mut out, u32::MAX);
            put_u16(&mut out, 0);
        } else {
            put_u32(&mut out, EOCD32_SIGNATURE);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0);
            put_u16(&mut out, entry_count as u16);
            put_u16(&mut out, entry_count as u16);
            put_u32(&mut out, cd_size as u32);
            put_u32(&mut out, cd_offset as u32);
            put_u16(&mut out, 0);
        }

        out
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::read::DeflateEncoder::new(data, flate2::Compression::default());
    let mut out = Vec::new();
    encoder.read_to_end(&mut out).unwrap();
    out
}

/// An in-memory [`RangeSource`] that counts fetch calls, so tests can
/// assert how many round trips an operation costs.
pub struct MemorySource {
    data: Vec<u8>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        MemorySource {
            data,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of read/read_many/read_tail calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn slice(&self, range: ByteRange) -> Result<Vec<u8>> {
        let start = range.start as usize;
        let end = range.end() as usize;
        if end > self.data.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("range {range} beyond {} bytes", self.data.len()),
            )));
        }
        Ok(self.data[start..end].to_vec())
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    async fn read(&self, range: ByteRange) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.slice(range)
    }

    async fn read_many(&self, ranges: &[ByteRange]) -> Result<Vec<Vec<u8>>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        ranges.iter().map(|r| self.slice(*r)).collect()
    }

    async fn read_tail(&self, n: u64) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let len = self.data.len() as u64;
        if n > len {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("tail of {n} bytes requested from {len} bytes"),
            )));
        }
        self.slice(ByteRange::new(len - n, n))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Drain a stream to bytes.
pub fn drain(mut stream: Box<dyn Read + Send>) -> Vec<u8> {
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    out
}
