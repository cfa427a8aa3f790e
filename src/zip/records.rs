//! ZIP file format records and their parsers.
//!
//! Each parser is a pure function from a byte cursor to a typed record,
//! following the PKZIP APPNOTE layout. Validation failures produce a
//! [`RecordError`] naming the failed field; buffer underflow is wrapped with
//! cause `Incomplete`, anything else with cause `Unknown`.
//!
//! ## ZIP File Layout
//!
//! ```text
//! [Local File Header 1]
//! [File Data 1]
//! [Local File Header 2]
//! [File Data 2]
//! ...
//! [Central File Header 1]
//! [Central File Header 2]
//! ...
//! [ZIP64 End of Central Directory Record] (optional)
//! [ZIP64 End of Central Directory Locator] (optional)
//! [End of Central Directory Record]
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{NaiveDate, NaiveDateTime};
use codepage_437::{BorrowFromCp437, CP437_CONTROL};

use super::extra::{ZipExtraField, epoch_datetime};
use crate::error::RecordError;

/// Local File Header signature ("PK\x03\x04").
pub const LFH_SIGNATURE: u32 = 0x04034B50;
/// Central File Header signature ("PK\x01\x02").
pub const CFH_SIGNATURE: u32 = 0x02014B50;
/// ZIP32 End of Central Directory signature ("PK\x05\x06").
pub const EOCD32_SIGNATURE: u32 = 0x06054B50;
/// ZIP64 End of Central Directory signature ("PK\x06\x06").
pub const EOCD64_SIGNATURE: u32 = 0x06064B50;
/// ZIP64 End of Central Directory Locator signature ("PK\x06\x07").
pub const ZIP64_LOCATOR_SIGNATURE: u32 = 0x07064B50;

/// Fixed size of a Local File Header, excluding its variable tail.
pub const LFH_SIZE: u64 = 30;
/// Size of a ZIP32 End of Central Directory record without comment.
pub const EOCD32_SIZE: u64 = 22;
/// Size of the ZIP64 End of Central Directory Locator.
pub const ZIP64_LOCATOR_SIZE: u64 = 20;
/// Fixed size of a ZIP64 End of Central Directory record.
pub const EOCD64_SIZE: u64 = 56;

/// Bit 3: sizes and CRC-32 live in a trailing data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// Bit 11: the file name and comment are UTF-8 encoded.
pub const FLAG_UTF8: u16 = 1 << 11;
/// Bit flags this reader refuses: encryption (0), imploding (6), and the
/// reserved/strong-encryption range (12-15).
const UNSUPPORTED_FLAGS: u16 = 1 << 0 | 1 << 6 | 1 << 12 | 1 << 13 | 1 << 14 | 1 << 15;

/// A field value equal to the maximum of its fixed-width integer type,
/// signalling that the real value lives in a companion ZIP64 record.
trait Sentinel: Copy + PartialEq {
    const SENTINEL: Self;
}

impl Sentinel for u16 {
    const SENTINEL: Self = u16::MAX;
}

impl Sentinel for u32 {
    const SENTINEL: Self = u32::MAX;
}

fn is_sentinel<T: Sentinel>(value: T) -> bool {
    value == T::SENTINEL
}

/// ZIP compression methods supported by this reader.
///
/// Anything other than `Stored` (0) and `Deflate` (8) fails parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression (method 0).
    Stored,
    /// Raw DEFLATE compression (method 8).
    Deflate,
}

impl CompressionMethod {
    fn from_u16(value: u16) -> Result<Self, RecordError> {
        match value {
            0 => Ok(CompressionMethod::Stored),
            8 => Ok(CompressionMethod::Deflate),
            other => Err(RecordError::invalid(format!(
                "unsupported compression method: {other}"
            ))),
        }
    }
}

/// End of Central Directory data, normalized across the ZIP32 and ZIP64
/// concrete forms.
///
/// The ZIP32 record holds sentinel values (`0xFFFF` / `0xFFFFFFFF`) when the
/// archive needs the ZIP64 form; [`EndOfDirectory::zip64`] reports that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfDirectory {
    /// Total number of Central Directory entries.
    pub entry_count: u64,
    /// Size of the Central Directory in bytes.
    pub cd_size: u64,
    /// Offset of the Central Directory from the start of the archive.
    pub cd_offset: u64,
    /// True when any ZIP32 field held its sentinel and the ZIP64 record
    /// must be consulted for the real values.
    pub zip64: bool,
}

impl EndOfDirectory {
    /// Parse the 22-byte ZIP32 End of Central Directory record.
    pub fn parse_zip32(data: &[u8]) -> Result<Self, RecordError> {
        let read_err = |e| RecordError::from_read("end of central directory record", e);
        let mut cursor = Cursor::new(data);

        let signature = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if signature != EOCD32_SIGNATURE {
            return Err(invalid_signature("end of central directory record", signature));
        }
        let disk_number = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let start_disk = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let disk_entries = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let total_entries = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let cd_size = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let cd_offset = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let _comment_len = cursor.read_u16::<LittleEndian>().map_err(read_err)?;

        if disk_number != 0 && !is_sentinel(disk_number) {
            return Err(RecordError::invalid(format!(
                "invalid disk number: {disk_number}"
            )));
        }
        if start_disk != disk_number {
            return Err(RecordError::invalid(format!(
                "start disk number {start_disk} does not match disk number {disk_number}"
            )));
        }
        if disk_entries != total_entries {
            return Err(RecordError::invalid(format!(
                "entries in CD disk ({disk_entries}) does not match total entries ({total_entries})"
            )));
        }

        let zip64 = is_sentinel(disk_number)
            || is_sentinel(start_disk)
            || is_sentinel(disk_entries)
            || is_sentinel(total_entries)
            || is_sentinel(cd_size)
            || is_sentinel(cd_offset);

        if zip64 {
            if cd_size != 0 && !is_sentinel(cd_size) {
                return Err(RecordError::invalid(format!(
                    "invalid size of CD for a ZIP64 archive: {cd_size}"
                )));
            }
            if cd_offset != 0 && !is_sentinel(cd_offset) {
                return Err(RecordError::invalid(format!(
                    "invalid offset of CD for a ZIP64 archive: {cd_offset}"
                )));
            }
            if total_entries != 0 && !is_sentinel(total_entries) {
                return Err(RecordError::invalid(format!(
                    "invalid entries in CD for a ZIP64 archive: {total_entries}"
                )));
            }
        }

        Ok(EndOfDirectory {
            entry_count: total_entries as u64,
            cd_size: cd_size as u64,
            cd_offset: cd_offset as u64,
            zip64,
        })
    }

    /// Parse the 56-byte ZIP64 End of Central Directory record.
    pub fn parse_zip64(data: &[u8]) -> Result<Self, RecordError> {
        let read_err = |e| RecordError::from_read("ZIP64 end of central directory record", e);
        let mut cursor = Cursor::new(data);

        let signature = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if signature != EOCD64_SIGNATURE {
            return Err(invalid_signature(
                "ZIP64 end of central directory record",
                signature,
            ));
        }
        let record_size = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        // The size field excludes the signature and itself.
        if record_size != EOCD64_SIZE - 12 {
            return Err(RecordError::invalid(format!(
                "invalid size of ZIP64 end of central directory record: {record_size}"
            )));
        }
        let _version_made_by = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let version_needed = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        if version_needed != 45 {
            return Err(RecordError::invalid(format!(
                "unsupported version needed to extract: {version_needed}"
            )));
        }
        let disk_number = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if disk_number != 0 {
            return Err(RecordError::invalid(format!(
                "invalid disk number: {disk_number}"
            )));
        }
        let start_disk = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if start_disk != 0 {
            return Err(RecordError::invalid(format!(
                "invalid start disk number: {start_disk}"
            )));
        }
        let disk_entries = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let total_entries = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        if disk_entries != total_entries {
            return Err(RecordError::invalid(format!(
                "entries in CD ({total_entries}) does not match entries on this disk ({disk_entries})"
            )));
        }
        let cd_size = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let cd_offset = cursor.read_u64::<LittleEndian>().map_err(read_err)?;

        Ok(EndOfDirectory {
            entry_count: total_entries,
            cd_size,
            cd_offset,
            zip64: true,
        })
    }
}

/// ZIP64 End of Central Directory Locator.
///
/// Sits immediately before the ZIP32 record in ZIP64 archives and carries
/// the absolute offset of the ZIP64 End of Central Directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64Locator {
    /// Absolute offset of the ZIP64 End of Central Directory record.
    pub eocd_offset: u64,
}

impl Zip64Locator {
    /// Parse the 20-byte locator record.
    pub fn parse(data: &[u8]) -> Result<Self, RecordError> {
        let read_err = |e| RecordError::from_read("ZIP64 locator record", e);
        let mut cursor = Cursor::new(data);

        let signature = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if signature != ZIP64_LOCATOR_SIGNATURE {
            return Err(invalid_signature("ZIP64 locator record", signature));
        }
        let start_disk = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if start_disk != 0 {
            return Err(RecordError::invalid(format!(
                "invalid start disk: {start_disk}"
            )));
        }
        let eocd_offset = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let total_disks = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if total_disks != 1 {
            return Err(RecordError::invalid(format!(
                "invalid number of disks: {total_disks}"
            )));
        }

        Ok(Zip64Locator { eocd_offset })
    }
}

/// One Central Directory entry: the archive-level metadata for a file or
/// directory, immutable after parsing.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// The entry name; a trailing `/` marks a directory.
    pub file_name: String,
    /// The entry comment, empty when absent.
    pub file_comment: String,
    /// Compression method, `Stored` or `Deflate`.
    pub compression_method: CompressionMethod,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Size of the compressed data in bytes.
    pub compressed_size: u64,
    /// Size of the uncompressed data in bytes.
    pub uncompressed_size: u64,
    /// Offset of this entry's Local File Header from the archive start.
    pub local_header_offset: u64,
    /// Last modification time (DOS granularity unless an extended
    /// timestamp overrode it).
    pub last_modified: NaiveDateTime,
    /// Last access time from an extended timestamp, when present.
    pub last_access: Option<NaiveDateTime>,
    /// Creation time from an extended timestamp, when present.
    pub created: Option<NaiveDateTime>,
    /// Raw general-purpose bit flags.
    pub bit_flags: u16,
    /// Length in bytes of the encoded file name, as stored on disk.
    pub(crate) file_name_len: u16,
}

impl ZipEntry {
    /// True when bit 3 is set: sizes and CRC-32 trail the data in a data
    /// descriptor and the Local File Header copies are zero.
    pub fn is_data_descriptor(&self) -> bool {
        self.bit_flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// True for directory entries (name ends with `/`).
    pub fn is_directory(&self) -> bool {
        self.file_name.ends_with('/')
    }

    /// Parse one Central File Header at the cursor, consuming its variable
    /// tail (file name, extra fields, comment).
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self, RecordError> {
        let read_err = |e| RecordError::from_read("central file header", e);

        let signature = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if signature != CFH_SIGNATURE {
            return Err(invalid_signature("central file header", signature));
        }
        let _version_made_by = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let version_needed = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        validate_version_needed(version_needed)?;
        let bit_flags = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        validate_bit_flags(bit_flags)?;
        let compression_method =
            CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>().map_err(read_err)?)?;
        let mod_time = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let mod_date = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let crc32 = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>().map_err(read_err)? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>().map_err(read_err)? as u64;
        let file_name_len = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        if file_name_len == 0 {
            return Err(RecordError::invalid("invalid file name length: 0"));
        }
        let extra_field_len = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let comment_len = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let start_disk = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        if start_disk != 0 {
            return Err(RecordError::invalid(format!(
                "central file header start disk must be 0, found {start_disk}"
            )));
        }
        let _internal_attributes = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let _external_attributes = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let mut local_header_offset = cursor.read_u32::<LittleEndian>().map_err(read_err)? as u64;

        let file_name = read_name(cursor, file_name_len, bit_flags, "central file header")?;
        let is_directory = file_name.ends_with('/');
        if bit_flags & FLAG_DATA_DESCRIPTOR != 0 && !is_directory && crc32 == 0 {
            return Err(RecordError::invalid(
                "CRC32 must be non-zero for a data descriptor entry",
            ));
        }

        let mut last_modified = dos_datetime(mod_time, mod_date);
        let mut last_access = None;
        let mut created = None;

        // Consume exactly extra_field_len bytes, dispatching each field by
        // its header ID.
        let mut extra = vec![0u8; extra_field_len as usize];
        cursor.read_exact(&mut extra).map_err(read_err)?;
        let mut extra_cursor = Cursor::new(extra.as_slice());
        while extra_cursor.position() < extra_field_len as u64 {
            match ZipExtraField::parse(&mut extra_cursor)? {
                ZipExtraField::Zip64(zip64) => {
                    compressed_size = zip64.compressed_size;
                    uncompressed_size = zip64.uncompressed_size;
                    local_header_offset = zip64.local_header_offset;
                }
                ZipExtraField::Timestamp(times) => {
                    if let Some(modified) = times.modified.and_then(epoch_datetime) {
                        last_modified = modified;
                    }
                    last_access = times.accessed.and_then(epoch_datetime);
                    created = times.created.and_then(epoch_datetime);
                }
                ZipExtraField::Generic(_) => {}
            }
        }

        let mut comment_bytes = vec![0u8; comment_len as usize];
        cursor.read_exact(&mut comment_bytes).map_err(read_err)?;
        let file_comment = decode_text(comment_bytes, bit_flags, "central file header")?;

        Ok(ZipEntry {
            file_name,
            file_comment,
            compression_method,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            last_modified,
            last_access,
            created,
            bit_flags,
            file_name_len,
        })
    }
}

/// A Local File Header, parsed at extraction time and cross-validated
/// against the Central Directory.
///
/// For data-descriptor entries the header's zero sizes and CRC-32 are
/// substituted with the Central Directory values.
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl LocalFileHeader {
    /// Parse a Local File Header at the cursor and validate it against the
    /// already-built Central Directory map.
    pub fn parse(
        cursor: &mut Cursor<&[u8]>,
        directory: &HashMap<String, ZipEntry>,
    ) -> Result<Self, RecordError> {
        let read_err = |e| RecordError::from_read("local file header", e);

        let signature = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if signature != LFH_SIGNATURE {
            return Err(invalid_signature("local file header", signature));
        }
        let version_needed = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        validate_version_needed(version_needed)?;
        let bit_flags = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        validate_bit_flags(bit_flags)?;
        let compression_method =
            CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>().map_err(read_err)?)?;
        let _mod_time = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let _mod_date = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let crc32 = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let compressed_size = cursor.read_u32::<LittleEndian>().map_err(read_err)? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>().map_err(read_err)? as u64;
        let file_name_len = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        if file_name_len == 0 {
            return Err(RecordError::invalid("invalid file name length: 0"));
        }
        let extra_field_len = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        if extra_field_len != 0 {
            return Err(RecordError::invalid(format!(
                "unexpected extra field length: {extra_field_len}"
            )));
        }

        let file_name = read_name(cursor, file_name_len, bit_flags, "local file header")?;
        let entry = directory.get(&file_name).ok_or_else(|| {
            RecordError::invalid(format!(
                "file name not present in the Central Directory: {file_name}"
            ))
        })?;

        let data_descriptor = bit_flags & FLAG_DATA_DESCRIPTOR != 0;
        if data_descriptor != entry.is_data_descriptor() {
            return Err(RecordError::invalid(
                "data descriptor bit flags disagree with the central file header",
            ));
        }

        if data_descriptor {
            // Sizes and CRC trail the data; the header copies must be zero
            // and the Central Directory values stand in for them.
            if crc32 != 0 {
                return Err(RecordError::invalid(format!(
                    "CRC32 must be zero in a data descriptor local header, found {crc32}"
                )));
            }
            if compressed_size != 0 {
                return Err(RecordError::invalid(format!(
                    "sizes must be zero in a data descriptor local header, found {compressed_size}"
                )));
            }
            Ok(LocalFileHeader {
                file_name,
                compression_method,
                crc32: entry.crc32,
                compressed_size: entry.compressed_size,
                uncompressed_size: entry.uncompressed_size,
            })
        } else {
            if compressed_size != entry.compressed_size
                || uncompressed_size != entry.uncompressed_size
            {
                return Err(RecordError::invalid(format!(
                    "sizes disagree with the central file header for {file_name}"
                )));
            }
            if crc32 != entry.crc32 {
                return Err(RecordError::invalid(format!(
                    "CRC32 disagrees with the central file header for {file_name}"
                )));
            }
            Ok(LocalFileHeader {
                file_name,
                compression_method,
                crc32,
                compressed_size,
                uncompressed_size,
            })
        }
    }
}

fn invalid_signature(record: &str, signature: u32) -> RecordError {
    RecordError::invalid(format!("invalid signature in {record}: {signature:#010X}"))
}

fn validate_version_needed(version: u16) -> Result<(), RecordError> {
    if version != 20 && version != 45 {
        return Err(RecordError::invalid(format!(
            "unsupported version needed to extract: {version}"
        )));
    }
    Ok(())
}

fn validate_bit_flags(flags: u16) -> Result<(), RecordError> {
    if flags & UNSUPPORTED_FLAGS != 0 {
        return Err(RecordError::invalid(format!(
            "unsupported bit flags: {flags:#06X}"
        )));
    }
    Ok(())
}

/// Read an encoded name of `len` bytes and decode it per bit 11.
fn read_name(
    cursor: &mut Cursor<&[u8]>,
    len: u16,
    flags: u16,
    record: &'static str,
) -> Result<String, RecordError> {
    let mut bytes = vec![0u8; len as usize];
    cursor
        .read_exact(&mut bytes)
        .map_err(|e| RecordError::from_read(record, e))?;
    decode_text(bytes, flags, record)
}

/// Decode name/comment bytes: UTF-8 when bit 11 is set, CP437 (the ZIP
/// default charset) otherwise.
fn decode_text(bytes: Vec<u8>, flags: u16, record: &'static str) -> Result<String, RecordError> {
    if flags & FLAG_UTF8 != 0 {
        String::from_utf8(bytes).map_err(|e| RecordError::unknown(record, e))
    } else {
        let text: Cow<str> = Cow::borrow_from_cp437(bytes.as_slice(), &CP437_CONTROL);
        Ok(text.into_owned())
    }
}

/// Decode a DOS date/time pair (2-second granularity).
///
/// Zeroed or nonsensical fields decode to the default timestamp rather
/// than failing: archives in the wild routinely carry them.
fn dos_datetime(time: u16, date: u16) -> NaiveDateTime {
    let second = ((time & 0x1F) * 2) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let hour = (time >> 11) as u32;
    let day = (date & 0x1F) as u32;
    let month = ((date >> 5) & 0x0F) as u32;
    let year = 1980 + (date >> 9) as i32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .unwrap_or_default()
}
