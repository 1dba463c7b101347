//! Minecraft Anvil region file format (.mca), legacy chunk layout.
//!
//! Region files contain 32x32 chunks in a specific binary format:
//! - Bytes 0-4095: Location table (1024 entries × 4 bytes)
//! - Bytes 4096-8191: Timestamp table (1024 entries × 4 bytes)
//! - Bytes 8192+: Chunk data (sector aligned, `[length:4][scheme:1][data:N]`)
//!
//! [`parse`] turns a whole `.mca` buffer into a [`Region`]: a sparse grid of
//! chunks, each a sparse stack of sections holding the block arrays listed
//! in [`BLOCK_ARRAYS`].

pub mod compression;
mod error;
mod header;
mod region;
mod section;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use compression::CompressionScheme;
pub use error::{AnvilError, ContainerFormatError, SectionFormatError};
pub use header::{SlotLocation, chunk_payload, read_header};
pub use region::{Region, RegionSummary, parse};
pub use section::{BLOCK_ARRAYS, Chunk, Section, canonical_len, extract};

/// Size of one sector in bytes (4 KB).
pub const SECTOR_BYTES: usize = 4096;

/// Header is 8192 bytes (location table + timestamp table, 2 sectors).
pub const HEADER_BYTES: usize = SECTOR_BYTES * 2;

/// Number of chunks per region dimension.
pub const REGION_SIZE: usize = 32;

/// Number of chunk slots in a region.
pub const REGION_CHUNKS: usize = REGION_SIZE * REGION_SIZE;

/// Vertical sections per chunk in the legacy layout.
pub const CHUNK_SECTIONS: usize = 16;

/// Calculate linear index for a chunk within a region (0-1023).
/// Formula: x + z * 32
#[inline]
pub fn local_to_index(x: usize, z: usize) -> usize {
    debug_assert!(x < REGION_SIZE && z < REGION_SIZE);
    z * REGION_SIZE + x
}

/// Calculate local coordinates from linear index.
#[inline]
pub fn index_to_local(index: usize) -> (usize, usize) {
    (index % REGION_SIZE, index / REGION_SIZE)
}

/// Calculate file offset for a chunk given its sector number.
#[inline]
pub fn sector_to_offset(sector: u32) -> usize {
    sector as usize * SECTOR_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for z in 0..REGION_SIZE {
            for x in 0..REGION_SIZE {
                let index = local_to_index(x, z);
                assert!(index < REGION_CHUNKS);
                assert_eq!(index_to_local(index), (x, z));
            }
        }
    }

    #[test]
    fn test_x_varies_fastest() {
        assert_eq!(local_to_index(1, 0), 1);
        assert_eq!(local_to_index(0, 1), 32);
        assert_eq!(local_to_index(31, 31), 1023);
    }

    #[test]
    fn test_sector_offset() {
        // First data sector sits right after the header
        assert_eq!(sector_to_offset(2), HEADER_BYTES);
        assert_eq!(sector_to_offset(3), 12288);
    }
}
