//! Region file header parsing.
//!
//! The header consists of two tables:
//! - Location table: where each chunk is stored
//! - Timestamp table: when each chunk was last saved (skipped here)

use crate::compression::{CompressionScheme, EXTERNAL_FLAG};
use crate::error::ContainerFormatError;
use crate::{HEADER_BYTES, REGION_CHUNKS, SECTOR_BYTES, index_to_local, sector_to_offset};

/// Bytes before the compressed data: `[length:4][scheme:1]`.
const PAYLOAD_PREFIX: usize = 5;

/// One entry of the location table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotLocation {
    /// Sector where the chunk payload starts.
    pub sector: u32,
    /// Number of sectors allocated to the chunk.
    pub sectors: u8,
}

impl SlotLocation {
    /// Minecraft stores: [Offset:3 bytes][Count:1 byte] (Big Endian)
    pub fn from_entry(entry: [u8; 4]) -> Self {
        Self {
            sector: u32::from_be_bytes([0, entry[0], entry[1], entry[2]]),
            sectors: entry[3],
        }
    }

    /// A zero sector count means the chunk was never generated.
    pub fn is_empty(&self) -> bool {
        self.sectors == 0
    }

    pub fn byte_offset(&self) -> usize {
        sector_to_offset(self.sector)
    }

    /// Bytes available to the payload, including its length and scheme prefix.
    pub fn capacity(&self) -> usize {
        self.sectors as usize * SECTOR_BYTES
    }
}

/// Read and validate the location table of a region buffer.
///
/// Every populated slot must start after the header, have its payload
/// prefix inside the buffer, and not share a sector with another slot.
pub fn read_header(bytes: &[u8]) -> Result<[SlotLocation; REGION_CHUNKS], ContainerFormatError> {
    if bytes.len() < HEADER_BYTES {
        return Err(ContainerFormatError::TooShort {
            len: bytes.len(),
            expected: HEADER_BYTES,
        });
    }

    let mut locations = [SlotLocation::default(); REGION_CHUNKS];
    for (index, entry) in bytes[..SECTOR_BYTES].chunks_exact(4).enumerate() {
        let location = SlotLocation::from_entry([entry[0], entry[1], entry[2], entry[3]]);
        if location.is_empty() {
            continue;
        }

        let (x, z) = index_to_local(index);
        if location.byte_offset() < HEADER_BYTES {
            return Err(ContainerFormatError::SlotInHeader { x, z, sector: location.sector });
        }
        let start = location.byte_offset();
        if start + PAYLOAD_PREFIX > bytes.len() {
            return Err(ContainerFormatError::OutOfRange {
                x,
                z,
                start,
                end: start + PAYLOAD_PREFIX,
                len: bytes.len(),
            });
        }
        locations[index] = location;
    }

    check_overlaps(&locations)?;
    Ok(locations)
}

fn check_overlaps(locations: &[SlotLocation; REGION_CHUNKS]) -> Result<(), ContainerFormatError> {
    let mut spans: Vec<(usize, SlotLocation)> = locations
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, location)| !location.is_empty())
        .collect();
    spans.sort_by_key(|(_, location)| location.sector);

    for pair in spans.windows(2) {
        let (prev_index, prev) = pair[0];
        let (index, next) = pair[1];
        if next.sector < prev.sector + prev.sectors as u32 {
            let (x, z) = index_to_local(index);
            let (other_x, other_z) = index_to_local(prev_index);
            return Err(ContainerFormatError::Overlap {
                x,
                z,
                other_x,
                other_z,
                sector: next.sector,
            });
        }
    }
    Ok(())
}

/// Unwrap and decompress the payload of the chunk at `index`.
///
/// The location must come from [`read_header`] on the same buffer.
pub fn chunk_payload(
    bytes: &[u8],
    index: usize,
    location: SlotLocation,
) -> Result<Vec<u8>, ContainerFormatError> {
    let (x, z) = index_to_local(index);
    if location.is_empty() {
        return Err(ContainerFormatError::EmptySlot { x, z });
    }
    let start = location.byte_offset();
    let prefix = bytes
        .get(start..start + PAYLOAD_PREFIX)
        .ok_or(ContainerFormatError::OutOfRange {
            x,
            z,
            start,
            end: start + PAYLOAD_PREFIX,
            len: bytes.len(),
        })?;

    // Parse header: [Length: 4 bytes][Type: 1 byte][Data...]
    let length = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    let scheme_id = prefix[4];

    // The length counts the scheme byte, so it is never zero.
    let capacity = location.capacity() - 4;
    if length == 0 || length as usize > capacity {
        return Err(ContainerFormatError::LengthMismatch {
            x,
            z,
            length,
            sectors: location.sectors,
            capacity,
        });
    }

    // Vanilla does not always pad the last chunk to a full sector, so only
    // the declared payload has to be inside the buffer.
    let end = start + 4 + length as usize;
    let data = bytes
        .get(start + PAYLOAD_PREFIX..end)
        .ok_or(ContainerFormatError::OutOfRange { x, z, start, end, len: bytes.len() })?;

    if scheme_id & EXTERNAL_FLAG != 0 {
        return Err(ContainerFormatError::ExternalPayload { x, z, scheme: scheme_id });
    }
    let scheme = CompressionScheme::from_id(scheme_id)
        .ok_or(ContainerFormatError::UnknownScheme { x, z, scheme: scheme_id })?;

    scheme
        .decompress(data)
        .map_err(|source| ContainerFormatError::Decompress { x, z, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_to_index;
    use std::io::Write;

    fn set_entry(buf: &mut [u8], index: usize, sector: u32, sectors: u8) {
        let entry = index * 4;
        buf[entry] = ((sector >> 16) & 0xFF) as u8;
        buf[entry + 1] = ((sector >> 8) & 0xFF) as u8;
        buf[entry + 2] = (sector & 0xFF) as u8;
        buf[entry + 3] = sectors;
    }

    fn write_payload(buf: &mut Vec<u8>, sector: u32, scheme: u8, data: &[u8]) {
        let start = sector_to_offset(sector);
        let end = start + 5 + data.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[start..start + 4].copy_from_slice(&((data.len() + 1) as u32).to_be_bytes());
        buf[start + 4] = scheme;
        buf[start + 5..end].copy_from_slice(data);
    }

    #[test]
    fn test_too_short() {
        let err = read_header(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, ContainerFormatError::TooShort { len: 100, .. }));
    }

    #[test]
    fn test_empty_header() {
        let locations = read_header(&vec![0u8; HEADER_BYTES]).unwrap();
        assert!(locations.iter().all(SlotLocation::is_empty));
    }

    #[test]
    fn test_entry_decoding() {
        let location = SlotLocation::from_entry([0x01, 0x02, 0x03, 7]);
        assert_eq!(location.sector, 0x010203);
        assert_eq!(location.sectors, 7);
    }

    #[test]
    fn test_slot_in_header() {
        let mut buf = vec![0u8; HEADER_BYTES + SECTOR_BYTES];
        set_entry(&mut buf, 5, 1, 1);
        let err = read_header(&buf).unwrap_err();
        assert!(matches!(err, ContainerFormatError::SlotInHeader { x: 5, z: 0, sector: 1 }));
    }

    #[test]
    fn test_out_of_range() {
        let mut buf = vec![0u8; HEADER_BYTES + SECTOR_BYTES];
        set_entry(&mut buf, local_to_index(3, 4), 9, 1);
        let err = read_header(&buf).unwrap_err();
        assert!(matches!(err, ContainerFormatError::OutOfRange { x: 3, z: 4, .. }));
    }

    #[test]
    fn test_overlap() {
        let mut buf = vec![0u8; HEADER_BYTES + 4 * SECTOR_BYTES];
        set_entry(&mut buf, local_to_index(0, 0), 2, 2);
        set_entry(&mut buf, local_to_index(1, 0), 3, 1);
        let err = read_header(&buf).unwrap_err();
        assert!(matches!(
            err,
            ContainerFormatError::Overlap { x: 1, z: 0, other_x: 0, other_z: 0, sector: 3 }
        ));
    }

    #[test]
    fn test_adjacent_spans_are_fine() {
        let mut buf = vec![0u8; HEADER_BYTES + 4 * SECTOR_BYTES];
        set_entry(&mut buf, 0, 2, 2);
        set_entry(&mut buf, 1, 4, 1);
        let locations = read_header(&buf).unwrap();
        assert_eq!(locations.iter().filter(|l| !l.is_empty()).count(), 2);
    }

    #[test]
    fn test_length_exceeds_allocation() {
        let mut buf = vec![0u8; HEADER_BYTES];
        set_entry(&mut buf, 0, 2, 1);
        write_payload(&mut buf, 2, CompressionScheme::NONE, &vec![1u8; SECTOR_BYTES]);
        let locations = read_header(&buf).unwrap();
        let err = chunk_payload(&buf, 0, locations[0]).unwrap_err();
        assert!(matches!(err, ContainerFormatError::LengthMismatch { sectors: 1, .. }));
    }

    #[test]
    fn test_empty_slot_has_no_payload() {
        let buf = vec![0u8; HEADER_BYTES];
        let locations = read_header(&buf).unwrap();
        let err = chunk_payload(&buf, 33, locations[33]).unwrap_err();
        assert!(matches!(err, ContainerFormatError::EmptySlot { x: 1, z: 1 }));
    }

    #[test]
    fn test_zero_length() {
        let mut buf = vec![0u8; HEADER_BYTES + SECTOR_BYTES];
        set_entry(&mut buf, 0, 2, 1);
        let locations = read_header(&buf).unwrap();
        let err = chunk_payload(&buf, 0, locations[0]).unwrap_err();
        assert!(matches!(err, ContainerFormatError::LengthMismatch { length: 0, .. }));
    }

    #[test]
    fn test_truncated_payload() {
        let mut buf = vec![0u8; HEADER_BYTES];
        set_entry(&mut buf, 0, 2, 1);
        write_payload(&mut buf, 2, CompressionScheme::NONE, &[1u8; 100]);
        buf.truncate(HEADER_BYTES + 50);
        let locations = read_header(&buf).unwrap();
        let err = chunk_payload(&buf, 0, locations[0]).unwrap_err();
        assert!(matches!(err, ContainerFormatError::OutOfRange { .. }));
    }

    #[test]
    fn test_unpadded_last_chunk() {
        let mut buf = vec![0u8; HEADER_BYTES];
        set_entry(&mut buf, 0, 2, 1);
        write_payload(&mut buf, 2, CompressionScheme::NONE, b"abc");
        assert_eq!(buf.len(), HEADER_BYTES + 8);
        let locations = read_header(&buf).unwrap();
        assert_eq!(chunk_payload(&buf, 0, locations[0]).unwrap(), b"abc");
    }

    #[test]
    fn test_unknown_scheme() {
        let mut buf = vec![0u8; HEADER_BYTES];
        set_entry(&mut buf, 0, 2, 1);
        write_payload(&mut buf, 2, 9, b"abc");
        let locations = read_header(&buf).unwrap();
        let err = chunk_payload(&buf, 0, locations[0]).unwrap_err();
        assert!(matches!(err, ContainerFormatError::UnknownScheme { scheme: 9, .. }));
    }

    #[test]
    fn test_external_scheme() {
        let mut buf = vec![0u8; HEADER_BYTES];
        set_entry(&mut buf, 0, 2, 1);
        write_payload(&mut buf, 2, EXTERNAL_FLAG | CompressionScheme::ZLIB, b"");
        let locations = read_header(&buf).unwrap();
        let err = chunk_payload(&buf, 0, locations[0]).unwrap_err();
        assert!(matches!(err, ContainerFormatError::ExternalPayload { .. }));
    }

    #[test]
    fn test_lz4_payload() {
        let mut compressed = Vec::new();
        lz4_java_wrc::Lz4BlockOutput::new(&mut compressed).write_all(b"lz4 chunk").unwrap();
        let mut buf = vec![0u8; HEADER_BYTES];
        set_entry(&mut buf, 0, 2, 1);
        write_payload(&mut buf, 2, CompressionScheme::LZ4, &compressed);
        let locations = read_header(&buf).unwrap();
        assert_eq!(chunk_payload(&buf, 0, locations[0]).unwrap(), b"lz4 chunk");
    }

    #[test]
    fn test_decompress_failure() {
        let mut buf = vec![0u8; HEADER_BYTES];
        set_entry(&mut buf, 0, 2, 1);
        write_payload(&mut buf, 2, CompressionScheme::ZLIB, b"not zlib at all");
        let locations = read_header(&buf).unwrap();
        let err = chunk_payload(&buf, 0, locations[0]).unwrap_err();
        assert!(matches!(err, ContainerFormatError::Decompress { x: 0, z: 0, .. }));
    }
}
