pub mod error;
pub mod index;
pub mod block;
pub mod io_stream;
pub mod walker;
pub mod alloc;
pub mod source;
pub mod archive;

use std::path::Path;

pub use archive::{Appended, Archive, ArchiveOptions, ListedEntry};
pub use block::{read_block, write_block, Block, ChainControl, BLOCK_SIZE};
pub use error::{ArchiveError, Corruption, Result};
pub use index::{EntryKind, FileName, IndexSlot, SlotStatus};
pub use io_stream::copy_bytes;

/// Create an empty archive at `path`.
pub fn create<P: AsRef<Path>>(path: P) -> Result<()> {
    Archive::create(path, ArchiveOptions::default()).map(drop)
}

/// Every `ACTUAL` entry of the archive at `path`, in chain order.
pub fn list<P: AsRef<Path>>(path: P) -> Result<Vec<ListedEntry>> {
    Archive::open_read_only(path, ArchiveOptions::default())?.entries()
}

/// Append the file or directory at `input` to the archive at `archive`.
pub fn append<P: AsRef<Path>, Q: AsRef<Path>>(archive: P, input: Q) -> Result<Appended> {
    Archive::open(archive, ArchiveOptions::default())?.append_path(input)
}
