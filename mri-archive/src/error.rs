use mri_anvil::SectionFormatError;
use thiserror::Error;

/// The stream decoded, but is not a valid region archive.
#[derive(Debug, Error)]
pub enum ArchiveFormatError {
    #[error("archive is not a valid gzip stream")]
    Compression(#[source] std::io::Error),

    #[error("archive body is not valid NBT")]
    Nbt(#[source] fastnbt::error::Error),

    #[error("root tag is {found:?}, expected a compound named `Region`")]
    RootName { found: Option<String> },

    #[error("archive has no version marker")]
    MissingVersion,

    #[error("archive version {0:?} is not supported")]
    UnsupportedVersion(String),

    #[error("`{0}` is not a chunk key (expected `x,z` with both below 32)")]
    ChunkKey(String),

    #[error("`{key}` in chunk {chunk} is not a section slot (expected 0..=15)")]
    SectionKey { chunk: String, key: String },

    #[error("`{path}` should be a {expected}")]
    UnexpectedTag { path: String, expected: &'static str },

    #[error("section `{path}` is malformed")]
    Section {
        path: String,
        #[source]
        source: SectionFormatError,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Format(#[from] ArchiveFormatError),

    #[error("failed to encode NBT")]
    Nbt(#[from] fastnbt::error::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
