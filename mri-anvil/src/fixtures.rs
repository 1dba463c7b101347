//! Legacy region buffers for tests.
//!
//! Chunks are serialized with fastnbt, compressed and framed as
//! `[length:4][scheme:1][data:N]`, then laid out one after another from
//! sector 2 with a matching location table.

use std::io::Write;

use fastnbt::ByteArray;
use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use serde::Serialize;

use crate::{CompressionScheme, HEADER_BYTES, REGION_CHUNKS, SECTOR_BYTES, local_to_index};

/// Number of populated chunks in [`sample_region_bytes`].
pub const SAMPLE_CHUNKS: usize = 349;

/// Block id stored at the start of every sample section 0.
pub const BEDROCK: u8 = 7;

#[derive(Serialize)]
struct ChunkNbt {
    #[serde(rename = "DataVersion")]
    data_version: i32,
    #[serde(rename = "Level")]
    level: LevelNbt,
}

#[derive(Serialize)]
struct LevelNbt {
    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,
    #[serde(rename = "LastUpdate")]
    last_update: i64,
    #[serde(rename = "TerrainPopulated")]
    terrain_populated: i8,
    #[serde(rename = "Sections")]
    sections: Vec<SectionNbt>,
}

#[derive(Serialize)]
struct SectionNbt {
    #[serde(rename = "Y")]
    y: i8,
    #[serde(rename = "Blocks", skip_serializing_if = "Option::is_none")]
    blocks: Option<ByteArray>,
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    data: Option<ByteArray>,
    #[serde(rename = "BlockLight", skip_serializing_if = "Option::is_none")]
    block_light: Option<ByteArray>,
    #[serde(rename = "SkyLight", skip_serializing_if = "Option::is_none")]
    sky_light: Option<ByteArray>,
    #[serde(rename = "Add", skip_serializing_if = "Option::is_none")]
    add: Option<ByteArray>,
}

/// Raw section contents; lengths are not checked so broken sections can be built.
#[derive(Debug, Clone)]
pub struct LegacySectionSpec {
    pub y: i8,
    pub blocks: Option<Vec<u8>>,
    pub data: Option<Vec<u8>>,
    pub block_light: Option<Vec<u8>>,
    pub sky_light: Option<Vec<u8>>,
    pub add: Option<Vec<u8>>,
}

impl LegacySectionSpec {
    /// All five arrays present. `Blocks[0]` is `first_block`, the rest is a
    /// pattern that differs per slot.
    pub fn filled(y: i8, first_block: u8) -> Self {
        let pattern = |len: usize, salt: usize| -> Vec<u8> {
            (0..len)
                .map(|i| ((i * 31 + salt * 17 + y as u8 as usize) % 251) as u8)
                .collect()
        };
        let mut blocks = pattern(4096, 1);
        blocks[0] = first_block;
        Self {
            y,
            blocks: Some(blocks),
            data: Some(pattern(2048, 2)),
            block_light: Some(pattern(2048, 3)),
            sky_light: Some(vec![0xFF; 2048]),
            add: Some(pattern(2048, 5)),
        }
    }

    /// Drop one array by its NBT name.
    pub fn without(mut self, name: &str) -> Self {
        match name {
            "Blocks" => self.blocks = None,
            "Data" => self.data = None,
            "BlockLight" => self.block_light = None,
            "SkyLight" => self.sky_light = None,
            "Add" => self.add = None,
            other => panic!("unknown array {other}"),
        }
        self
    }

    fn to_nbt(&self) -> SectionNbt {
        let array = |bytes: &Option<Vec<u8>>| {
            bytes
                .as_ref()
                .map(|bytes| ByteArray::new(bytes.iter().map(|&b| b as i8).collect()))
        };
        SectionNbt {
            y: self.y,
            blocks: array(&self.blocks),
            data: array(&self.data),
            block_light: array(&self.block_light),
            sky_light: array(&self.sky_light),
            add: array(&self.add),
        }
    }
}

/// Uncompressed NBT of a legacy chunk.
pub fn legacy_chunk_nbt(x: i32, z: i32, sections: &[LegacySectionSpec]) -> Vec<u8> {
    let chunk = ChunkNbt {
        data_version: 1343,
        level: LevelNbt {
            x_pos: x,
            z_pos: z,
            last_update: 0,
            terrain_populated: 1,
            sections: sections.iter().map(LegacySectionSpec::to_nbt).collect(),
        },
    };
    fastnbt::to_bytes(&chunk).expect("fixture chunk serializes")
}

/// Compress and frame a chunk: `[length:4][scheme:1][data:N]`.
pub fn wrap_chunk(nbt_data: &[u8], scheme: CompressionScheme) -> Vec<u8> {
    let compressed = match scheme {
        CompressionScheme::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(nbt_data).expect("zlib write");
            encoder.finish().expect("zlib finish")
        }
        CompressionScheme::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(nbt_data).expect("gzip write");
            encoder.finish().expect("gzip finish")
        }
        CompressionScheme::Uncompressed => nbt_data.to_vec(),
        CompressionScheme::Lz4 => {
            let mut compressed = Vec::new();
            {
                let mut output = lz4_java_wrc::Lz4BlockOutput::new(&mut compressed);
                output.write_all(nbt_data).expect("lz4 write");
                output.flush().expect("lz4 flush");
            }
            compressed
        }
    };

    let total_len = (compressed.len() + 1) as u32; // +1 byte for scheme
    let mut blob = Vec::with_capacity(5 + compressed.len());
    blob.extend_from_slice(&total_len.to_be_bytes());
    blob.push(scheme.id());
    blob.extend_from_slice(&compressed);
    blob
}

/// Lay out framed chunk blobs into a region buffer, each padded to whole sectors.
pub fn region_bytes(chunks: &[(usize, usize, Vec<u8>)]) -> Vec<u8> {
    let mut region = vec![0u8; HEADER_BYTES];
    let mut next_sector = (HEADER_BYTES / SECTOR_BYTES) as u32;

    for (x, z, blob) in chunks {
        let sectors = blob.len().div_ceil(SECTOR_BYTES) as u32;
        let entry = local_to_index(*x, *z) * 4;
        region[entry] = ((next_sector >> 16) & 0xFF) as u8;
        region[entry + 1] = ((next_sector >> 8) & 0xFF) as u8;
        region[entry + 2] = (next_sector & 0xFF) as u8;
        region[entry + 3] = sectors as u8;

        region.extend_from_slice(blob);
        region.resize(region.len().next_multiple_of(SECTOR_BYTES), 0);
        next_sector += sectors;
    }

    region
}

/// Whether the sample region has a chunk at `(x, z)`.
///
/// `i -> (i * 37 + 300) % 1024` is a permutation of the slots, so exactly
/// [`SAMPLE_CHUNKS`] slots are populated, (16, 27) among them.
pub fn sample_chunk_present(x: usize, z: usize) -> bool {
    (local_to_index(x, z) * 37 + 300) % REGION_CHUNKS < SAMPLE_CHUNKS
}

/// Legacy sections of a sample chunk: slot 0 starts with bedrock, higher
/// slots vary in count and in which arrays they carry.
pub fn sample_sections(x: usize, z: usize) -> Vec<LegacySectionSpec> {
    let index = local_to_index(x, z);
    let height = 1 + index % 8;
    (0..height)
        .map(|y| {
            let spec = if y == 0 {
                LegacySectionSpec::filled(0, BEDROCK)
            } else {
                LegacySectionSpec::filled(y as i8, (index % 256) as u8)
            };
            if y % 2 == 1 { spec.without("Add") } else { spec }
        })
        .collect()
}

/// A region with [`SAMPLE_CHUNKS`] populated legacy chunks.
pub fn sample_region_bytes() -> Vec<u8> {
    let mut chunks = Vec::with_capacity(SAMPLE_CHUNKS);
    for z in 0..32 {
        for x in 0..32 {
            if !sample_chunk_present(x, z) {
                continue;
            }
            let nbt = legacy_chunk_nbt(x as i32, z as i32, &sample_sections(x, z));
            let scheme = if local_to_index(x, z) % 5 == 0 {
                CompressionScheme::Gzip
            } else {
                CompressionScheme::Zlib
            };
            chunks.push((x, z, wrap_chunk(&nbt, scheme)));
        }
    }
    region_bytes(&chunks)
}
