//! Compression schemes used for chunk payloads inside a region file.
//!
//! Same IDs as used by vanilla Minecraft. The scheme byte follows the
//! 4-byte length of every chunk payload.

use std::fmt;
use std::io::Read;

/// Scheme ids with this bit set store the payload in an external `.mcc` file.
pub const EXTERNAL_FLAG: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionScheme {
    Gzip,
    Zlib,
    Uncompressed,
    Lz4,
}

impl CompressionScheme {
    pub const GZIP: u8 = 1;
    pub const ZLIB: u8 = 2;
    pub const NONE: u8 = 3;
    pub const LZ4: u8 = 4;

    /// Map a scheme byte to a known scheme. There is no fallback for
    /// unknown ids.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            Self::GZIP => Some(Self::Gzip),
            Self::ZLIB => Some(Self::Zlib),
            Self::NONE => Some(Self::Uncompressed),
            Self::LZ4 => Some(Self::Lz4),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::Gzip => Self::GZIP,
            Self::Zlib => Self::ZLIB,
            Self::Uncompressed => Self::NONE,
            Self::Lz4 => Self::LZ4,
        }
    }

    /// Decompress a chunk payload (the bytes after the scheme byte).
    pub fn decompress(self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decompressed = Vec::new();
        match self {
            Self::Gzip => {
                flate2::read::GzDecoder::new(data).read_to_end(&mut decompressed)?;
            }
            Self::Zlib => {
                flate2::read::ZlibDecoder::new(data).read_to_end(&mut decompressed)?;
            }
            Self::Uncompressed => decompressed.extend_from_slice(data),
            Self::Lz4 => {
                lz4_java_wrc::Lz4BlockInput::new(data).read_to_end(&mut decompressed)?;
            }
        }
        Ok(decompressed)
    }
}

impl fmt::Display for CompressionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gzip => "gzip",
            Self::Zlib => "zlib",
            Self::Uncompressed => "none",
            Self::Lz4 => "lz4",
        };
        f.write_str(name)
    }
}
