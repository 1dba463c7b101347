use thiserror::Error;

/// Malformed `.mca` container: bad header, bad sector pointers or an
/// undecodable chunk payload.
#[derive(Debug, Error)]
pub enum ContainerFormatError {
    #[error("region buffer is {len} bytes, shorter than the {expected}-byte header")]
    TooShort { len: usize, expected: usize },

    #[error("chunk ({x}, {z}) is not stored in this region")]
    EmptySlot { x: usize, z: usize },

    #[error("chunk ({x}, {z}) points at sector {sector}, inside the header")]
    SlotInHeader { x: usize, z: usize, sector: u32 },

    #[error("chunk ({x}, {z}) spans bytes {start}..{end} but the buffer is {len} bytes")]
    OutOfRange { x: usize, z: usize, start: usize, end: usize, len: usize },

    #[error("chunk ({x}, {z}) overlaps chunk ({other_x}, {other_z}) at sector {sector}")]
    Overlap { x: usize, z: usize, other_x: usize, other_z: usize, sector: u32 },

    #[error("chunk ({x}, {z}) declares {length} payload bytes but its {sectors} sectors hold at most {capacity}")]
    LengthMismatch { x: usize, z: usize, length: u32, sectors: u8, capacity: usize },

    #[error("chunk ({x}, {z}) uses unknown compression scheme {scheme}")]
    UnknownScheme { x: usize, z: usize, scheme: u8 },

    #[error("chunk ({x}, {z}) is stored in an external .mcc file (scheme {scheme})")]
    ExternalPayload { x: usize, z: usize, scheme: u8 },

    #[error("chunk ({x}, {z}) failed to decompress")]
    Decompress {
        x: usize,
        z: usize,
        #[source]
        source: std::io::Error,
    },
}

/// A section violates the block array layout.
#[derive(Debug, Error)]
pub enum SectionFormatError {
    #[error("array `{name}` is {actual} bytes, expected {expected}")]
    LengthMismatch { name: &'static str, expected: usize, actual: usize },

    #[error("unknown block array `{0}`")]
    UnknownArray(String),

    #[error("array `{0}` is not a byte array")]
    WrongTagType(&'static str),

    #[error("section slot {0} is outside 0..=15")]
    SlotOutOfRange(i64),

    #[error("section slot {0} appears more than once")]
    DuplicateSlot(u8),

    #[error("section uses the palette layout (`{0}`), not legacy block arrays")]
    UnsupportedLayout(&'static str),

    #[error("section entry has no `Y` byte")]
    MissingSlot,

    #[error("chunk payload is not valid NBT")]
    Nbt(#[from] fastnbt::error::Error),
}

/// Error returned by [`crate::parse`].
#[derive(Debug, Error)]
pub enum AnvilError {
    #[error(transparent)]
    Container(#[from] ContainerFormatError),

    #[error("chunk ({x}, {z}) has a malformed section")]
    Section {
        x: usize,
        z: usize,
        #[source]
        source: SectionFormatError,
    },
}
