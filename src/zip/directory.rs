//! Central Directory loading.
//!
//! ZIP archives are read from the end: one tail read covers the ZIP32
//! trailer and the ZIP64 locator slot, a second read upgrades to the ZIP64
//! trailer when the ZIP32 record carries sentinel values, and one final read
//! fetches the whole Central Directory. Three reads at most, which for an
//! HTTP source means three Range requests to list any archive.

use std::collections::HashMap;
use std::io::Cursor;

use log::{debug, warn};

use super::records::{
    EOCD32_SIZE, EOCD64_SIZE, EndOfDirectory, ZIP64_LOCATOR_SIZE, Zip64Locator, ZipEntry,
};
use crate::error::Result;
use crate::io::{ByteRange, RangeSource};

/// Read the archive trailer and materialize the directory map.
///
/// Duplicate names in the Central Directory are tolerated: the later entry
/// overwrites the earlier one, with a warning.
pub(crate) async fn load<S: RangeSource>(source: &S) -> Result<HashMap<String, ZipEntry>> {
    // The tail covers both the ZIP32 record and, in ZIP64 archives, the
    // locator that immediately precedes it.
    let tail = source.read_tail(EOCD32_SIZE + ZIP64_LOCATOR_SIZE).await?;
    let mut eocd = EndOfDirectory::parse_zip32(&tail[ZIP64_LOCATOR_SIZE as usize..])?;

    if eocd.zip64 {
        let locator = Zip64Locator::parse(&tail[..ZIP64_LOCATOR_SIZE as usize])?;
        debug!(
            "ZIP64 archive, end of central directory at offset {}",
            locator.eocd_offset
        );
        let record = source
            .read(ByteRange::new(locator.eocd_offset, EOCD64_SIZE))
            .await?;
        eocd = EndOfDirectory::parse_zip64(&record)?;
    }

    debug!(
        "central directory: {} entries, {} bytes at offset {}",
        eocd.entry_count, eocd.cd_size, eocd.cd_offset
    );

    let cd = source
        .read(ByteRange::new(eocd.cd_offset, eocd.cd_size))
        .await?;
    let mut cursor = Cursor::new(cd.as_slice());

    let mut directory = HashMap::with_capacity(eocd.entry_count as usize);
    for _ in 0..eocd.entry_count {
        let entry = ZipEntry::parse(&mut cursor)?;
        if let Some(previous) = directory.insert(entry.file_name.clone(), entry) {
            warn!(
                "duplicate entry name {:?} in central directory, keeping the later one",
                previous.file_name
            );
        }
    }

    Ok(directory)
}
