//! Whole-region archive format (`.mri.gz`).
//!
//! Instead of compressing each chunk on its own like `.mca` does, the whole
//! region is written as one NBT tree and compressed as a single gzip stream,
//! so redundancy between neighbouring chunks is shared.

mod document;
mod error;

use std::io::{Read, Write};

use fastnbt::{SerOpts, Value};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use mri_anvil::Region;

pub use error::{ArchiveError, ArchiveFormatError};

use document::{RegionDoc, region_from_root};

/// Name of the root compound.
pub const ROOT_NAME: &str = "Region";

/// Key of the version marker inside the root compound.
pub const VERSION_KEY: &str = "MRI Version";

/// The only archive version this crate reads and writes.
pub const VERSION: &str = "1.0";

/// File extension used by the directory converter.
pub const EXTENSION: &str = "mri.gz";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TAG_COMPOUND: u8 = 10;

/// Write `region` as a gzip-compressed archive and return the inner writer.
///
/// The gzip stream is finished, but the writer itself is not flushed.
pub fn write<W: Write>(region: &Region, writer: W, level: Compression) -> Result<W, ArchiveError> {
    let mut encoder = GzEncoder::new(writer, level);
    fastnbt::to_writer_with_opts(&mut encoder, &RegionDoc(region), SerOpts::new().root_name(ROOT_NAME))?;
    Ok(encoder.finish()?)
}

/// Serialize `region` into an in-memory archive.
pub fn to_bytes(region: &Region, level: Compression) -> Result<Vec<u8>, ArchiveError> {
    write(region, Vec::new(), level)
}

/// Read an archive back into a region.
pub fn read<R: Read>(reader: R) -> Result<Region, ArchiveError> {
    let mut nbt = Vec::new();
    if let Err(err) = GzDecoder::new(reader).read_to_end(&mut nbt) {
        return Err(match err.kind() {
            std::io::ErrorKind::InvalidData
            | std::io::ErrorKind::InvalidInput
            | std::io::ErrorKind::UnexpectedEof => ArchiveFormatError::Compression(err).into(),
            _ => ArchiveError::Io(err),
        });
    }
    from_nbt(&nbt)
}

pub fn from_bytes(bytes: &[u8]) -> Result<Region, ArchiveError> {
    read(bytes)
}

/// Whether `bytes` start like a gzip stream, which every archive does and
/// no region file does.
pub fn is_archive(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

fn from_nbt(nbt: &[u8]) -> Result<Region, ArchiveError> {
    let found = root_name(nbt);
    if found != Some(ROOT_NAME) {
        return Err(ArchiveFormatError::RootName { found: found.map(str::to_string) }.into());
    }

    let value = fastnbt::from_bytes::<Value>(nbt).map_err(ArchiveFormatError::Nbt)?;
    let Value::Compound(root) = value else {
        return Err(ArchiveFormatError::RootName { found: None }.into());
    };
    let region = region_from_root(root)?;
    log::debug!("Read archive: {} chunks", region.len());
    Ok(region)
}

/// Name of the root tag if it is a compound: `[10][name length:2][name]`.
fn root_name(nbt: &[u8]) -> Option<&str> {
    let (&tag, rest) = nbt.split_first()?;
    if tag != TAG_COMPOUND {
        return None;
    }
    let len = u16::from_be_bytes([*rest.first()?, *rest.get(1)?]) as usize;
    std::str::from_utf8(rest.get(2..2 + len)?).ok()
}
