//! Extra-field parsing for Central Directory entries.
//!
//! Each extra field is a 2-byte header ID, a 2-byte payload length, and
//! exactly that many payload bytes. Two IDs get typed treatment, ZIP64
//! extended information (`0x0001`) and the extended timestamp (`0x5455`);
//! everything else is preserved opaquely.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, NaiveDateTime};

use crate::error::RecordError;

/// Header ID of the ZIP64 extended information extra field.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Header ID of the extended timestamp extra field.
pub const TIMESTAMP_EXTRA_ID: u16 = 0x5455;

/// One extra field attached to a Central Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipExtraField {
    /// ZIP64 extended information: 64-bit sizes and local-header offset.
    Zip64(Zip64ExtraField),
    /// Extended timestamp: Unix epoch modify/access/create times.
    Timestamp(ExtendedTimestamp),
    /// Any other extra field, preserved opaquely.
    Generic(GenericExtraField),
}

impl ZipExtraField {
    /// Decode the next extra field at the cursor: header ID, payload length,
    /// then exactly that many payload bytes, dispatched by ID.
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self, RecordError> {
        let read_err = |e| RecordError::from_read("extra field", e);
        let header_id = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let length = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let mut payload = vec![0u8; length as usize];
        cursor.read_exact(&mut payload).map_err(read_err)?;

        match header_id {
            ZIP64_EXTRA_ID => Ok(ZipExtraField::Zip64(Zip64ExtraField::parse(&payload)?)),
            TIMESTAMP_EXTRA_ID => Ok(ZipExtraField::Timestamp(ExtendedTimestamp::parse(
                &payload,
            )?)),
            _ => Ok(ZipExtraField::Generic(GenericExtraField {
                header_id,
                data: payload,
            })),
        }
    }

    /// Serialize back to the on-disk layout (header ID, length, payload).
    pub fn to_bytes(&self) -> Vec<u8> {
        let (id, payload) = match self {
            ZipExtraField::Zip64(f) => (ZIP64_EXTRA_ID, f.payload()),
            ZipExtraField::Timestamp(f) => (TIMESTAMP_EXTRA_ID, f.payload()),
            ZipExtraField::Generic(f) => (f.header_id, f.data.clone()),
        };
        let mut out = Vec::with_capacity(4 + payload.len());
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }
}

/// ZIP64 extended information (header ID `0x0001`).
///
/// Carries the 64-bit values that overflow the 32-bit Central Directory
/// fields; the entry parser substitutes them over the sentinel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64ExtraField {
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub local_header_offset: u64,
}

impl Zip64ExtraField {
    fn parse(payload: &[u8]) -> Result<Self, RecordError> {
        let read_err = |e| RecordError::from_read("ZIP64 extra field", e);
        let mut cursor = Cursor::new(payload);
        let uncompressed_size = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let compressed_size = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let local_header_offset = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let start_disk = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if start_disk != 0 {
            return Err(RecordError::invalid(format!(
                "invalid start disk in ZIP64 extra field: {start_disk}"
            )));
        }
        Ok(Zip64ExtraField {
            uncompressed_size,
            compressed_size,
            local_header_offset,
        })
    }

    fn payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(28);
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&self.local_header_offset.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }
}

/// Extended timestamp (header ID `0x5455`).
///
/// A flag byte announces which of modify/access/create are present; each
/// present time is a 32-bit Unix epoch-seconds value, consumed only while
/// the payload still has room for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedTimestamp {
    flags: u8,
    pub modified: Option<u32>,
    pub accessed: Option<u32>,
    pub created: Option<u32>,
}

const MODIFIED_BIT: u8 = 1 << 0;
const ACCESSED_BIT: u8 = 1 << 1;
const CREATED_BIT: u8 = 1 << 2;

impl ExtendedTimestamp {
    fn parse(payload: &[u8]) -> Result<Self, RecordError> {
        let read_err = |e| RecordError::from_read("extended timestamp extra field", e);
        let mut cursor = Cursor::new(payload);
        let flags = cursor.read_u8().map_err(read_err)?;

        let mut next = |bit: u8| -> Result<Option<u32>, RecordError> {
            let room = payload.len() as u64 - cursor.position() >= 4;
            if flags & bit != 0 && room {
                Ok(Some(cursor.read_u32::<LittleEndian>().map_err(read_err)?))
            } else {
                Ok(None)
            }
        };
        let modified = next(MODIFIED_BIT)?;
        let accessed = next(ACCESSED_BIT)?;
        let created = next(CREATED_BIT)?;

        Ok(ExtendedTimestamp {
            flags,
            modified,
            accessed,
            created,
        })
    }

    fn payload(&self) -> Vec<u8> {
        let mut out = vec![self.flags];
        for time in [self.modified, self.accessed, self.created]
            .into_iter()
            .flatten()
        {
            out.extend_from_slice(&time.to_le_bytes());
        }
        out
    }
}

/// An extra field this crate doesn't interpret, kept as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericExtraField {
    pub header_id: u16,
    pub data: Vec<u8>,
}

/// Convert an epoch-seconds timestamp to a naive UTC datetime.
pub(crate) fn epoch_datetime(secs: u32) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.naive_utc())
}
