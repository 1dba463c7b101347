//! In-memory region: a sparse 32x32 grid of chunks.

use crate::error::AnvilError;
use crate::header::{chunk_payload, read_header};
use crate::section::{BLOCK_ARRAYS, Chunk, extract};
use crate::{REGION_CHUNKS, REGION_SIZE, index_to_local, local_to_index};

/// Up to 1024 chunks addressed by local `(x, z)`, `0 <= x, z < 32`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    chunks: Vec<Option<Chunk>>,
}

impl Region {
    /// A region with no chunks.
    pub fn new() -> Self {
        Self {
            chunks: std::iter::repeat_with(|| None).take(REGION_CHUNKS).collect(),
        }
    }

    /// Chunk at local coordinates, `None` if never generated or out of range.
    pub fn chunk(&self, x: usize, z: usize) -> Option<&Chunk> {
        if x >= REGION_SIZE || z >= REGION_SIZE {
            return None;
        }
        self.chunks[local_to_index(x, z)].as_ref()
    }

    pub fn chunk_present(&self, x: usize, z: usize) -> bool {
        self.chunk(x, z).is_some()
    }

    /// Place a chunk, returning the one it replaced.
    ///
    /// # Panics
    ///
    /// Panics if either coordinate is not less than 32.
    pub fn insert(&mut self, x: usize, z: usize, chunk: Chunk) -> Option<Chunk> {
        assert!(x < REGION_SIZE && z < REGION_SIZE, "chunk ({x}, {z}) out of bounds");
        self.chunks[local_to_index(x, z)].replace(chunk)
    }

    /// Present chunks in slot order (x varies fastest).
    pub fn chunks(&self) -> impl Iterator<Item = ((usize, usize), &Chunk)> + '_ {
        self.chunks
            .iter()
            .enumerate()
            .filter_map(|(index, chunk)| chunk.as_ref().map(|chunk| (index_to_local(index), chunk)))
    }

    /// Number of present chunks.
    pub fn len(&self) -> usize {
        self.chunks.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> RegionSummary {
        let mut summary = RegionSummary::default();
        for (_, chunk) in self.chunks() {
            summary.chunks += 1;
            for (_, section) in chunk.sections() {
                summary.sections += 1;
                for (name, _) in section.iter() {
                    if let Some(slot) = BLOCK_ARRAYS.iter().position(|(known, _)| *known == name) {
                        summary.arrays[slot] += 1;
                    }
                }
            }
        }
        summary
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts of what a region holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionSummary {
    pub chunks: usize,
    pub sections: usize,
    /// Present arrays per name, in [`BLOCK_ARRAYS`] order.
    pub arrays: [usize; BLOCK_ARRAYS.len()],
}

impl RegionSummary {
    pub fn array_counts(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        BLOCK_ARRAYS.iter().map(|(name, _)| *name).zip(self.arrays.iter().copied())
    }
}

/// Parse a whole `.mca` buffer.
///
/// Any container problem or malformed section fails the whole region.
pub fn parse(bytes: &[u8]) -> Result<Region, AnvilError> {
    let locations = read_header(bytes)?;

    let mut region = Region::new();
    for (index, location) in locations.iter().enumerate() {
        if location.is_empty() {
            continue;
        }
        let (x, z) = index_to_local(index);
        let payload = chunk_payload(bytes, index, *location)?;
        let chunk = extract(&payload).map_err(|source| AnvilError::Section { x, z, source })?;
        region.chunks[index] = Some(chunk);
    }

    log::debug!("Parsed region: {} chunks from {} bytes", region.len(), bytes.len());
    Ok(region)
}

impl TryFrom<&[u8]> for Region {
    type Error = AnvilError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        parse(bytes)
    }
}
