//! Error taxonomy shared by every engine operation.
//!
//! Each variant corresponds to one failure class of the archive engine and
//! maps to a distinct process exit code via [`ArchiveError::exit_code`].
//! Short reads and short writes are not errors: they are retried by the
//! partial-I/O loops in [`crate::io_stream`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::index::SlotStatus;

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

/// Why an index chain was judged corrupt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Corruption {
    /// The chain-control slot holds neither `CONTINUE` nor `EOA`.
    #[error("chain control slot holds {0}")]
    ChainControl(SlotStatus),
    /// Every usable slot in the chain is taken and the last block is `EOA`.
    #[error("no free index slot left in the block chain")]
    NoFreeSlot,
    #[error("continuation distance {0} is beyond the seekable range")]
    DistanceOverflow(u64),
    #[error("entry extent {position} + {length} overflows")]
    ExtentOverflow { position: u64, length: u64 },
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// An argument the engine cannot act on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("unable to create archive '{}': {source}", path.display())]
    UnableToCreateArchive { path: PathBuf, source: io::Error },
    #[error("unable to open archive '{}': {source}", path.display())]
    UnableToOpenArchive { path: PathBuf, source: io::Error },
    #[error("unable to open input '{}': {source}", path.display())]
    UnableToOpenInput { path: PathBuf, source: io::Error },
    #[error("block magic corrupt: found {found:#06x}")]
    MagicCorrupt { found: u16 },
    #[error("archive index corrupt: {0}")]
    ArchiveIndexCorrupt(Corruption),
    /// The device accepted zero bytes of a non-empty write.
    #[error("unexpected write error: zero bytes written")]
    UnexpectedWriteError,
    #[error("unexpected end of file: needed {expected} bytes, got {actual}")]
    UnexpectedEof { expected: u64, actual: u64 },
    #[error("file name is {len} bytes, the index holds at most {max}")]
    NameTooLong { len: usize, max: usize },
}

impl From<Corruption> for ArchiveError {
    fn from(c: Corruption) -> Self {
        ArchiveError::ArchiveIndexCorrupt(c)
    }
}

impl ArchiveError {
    /// Process exit code for this error. Zero is reserved for success.
    pub fn exit_code(&self) -> u8 {
        match self {
            ArchiveError::InvalidArgument(_)            => 1,
            ArchiveError::Io(_)                         => 2,
            ArchiveError::UnableToCreateArchive { .. }  => 3,
            ArchiveError::UnableToOpenArchive { .. }    => 4,
            ArchiveError::UnableToOpenInput { .. }      => 5,
            ArchiveError::MagicCorrupt { .. }           => 6,
            ArchiveError::ArchiveIndexCorrupt(_)        => 7,
            ArchiveError::UnexpectedWriteError          => 8,
            ArchiveError::UnexpectedEof { .. }          => 9,
            ArchiveError::NameTooLong { .. }            => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            ArchiveError::InvalidArgument(String::new()),
            ArchiveError::Io(io::Error::new(io::ErrorKind::Other, "x")),
            ArchiveError::UnableToCreateArchive { path: "a".into(), source: io::ErrorKind::NotFound.into() },
            ArchiveError::UnableToOpenArchive { path: "a".into(), source: io::ErrorKind::NotFound.into() },
            ArchiveError::UnableToOpenInput { path: "a".into(), source: io::ErrorKind::NotFound.into() },
            ArchiveError::MagicCorrupt { found: 0 },
            ArchiveError::ArchiveIndexCorrupt(Corruption::NoFreeSlot),
            ArchiveError::UnexpectedWriteError,
            ArchiveError::UnexpectedEof { expected: 1, actual: 0 },
            ArchiveError::NameTooLong { len: 300, max: 256 },
        ];
        let mut codes: Vec<u8> = errors.iter().map(ArchiveError::exit_code).collect();
        assert!(!codes.contains(&0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_corruption_message_names_status() {
        let err = ArchiveError::from(Corruption::ChainControl(SlotStatus::Free));
        assert_eq!(err.to_string(), "archive index corrupt: chain control slot holds FREE");
    }
}
