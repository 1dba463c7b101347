use std::path::PathBuf;

use mri_anvil::{AnvilError, ContainerFormatError};
use mri_archive::ArchiveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to {op} {}", path.display())]
    Io {
        path: PathBuf,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid region file", path.display())]
    Anvil {
        path: PathBuf,
        #[source]
        source: AnvilError,
    },

    #[error("failed to write archive {}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("archive {} does not read back to the parsed region", path.display())]
    Verify { path: PathBuf },

    #[error("{} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error("{} is not named like a region file (`*.mca`)", .0.display())]
    NotARegionFile(PathBuf),

    #[error("source deleted but {} could not be renamed to {}; the archive is kept at the first path", temp.display(), target.display())]
    Rename {
        temp: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl ConvertError {
    /// The malformed-container cause, if that is why the file failed.
    pub fn container_format(&self) -> Option<&ContainerFormatError> {
        match self {
            Self::Anvil { source: AnvilError::Container(err), .. } => Some(err),
            _ => None,
        }
    }
}
