//! What the engine needs to know about an item before storing it.

use std::fs::Metadata;

use crate::index::EntryKind;
use crate::io_stream::DEFAULT_COPY_BUFFER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMeta {
    /// Payload bytes to store.  Directories are markers and store none.
    pub length:     u64,
    pub uid:        u32,
    pub gid:        u32,
    pub kind:       EntryKind,
    /// Preferred transfer size for reading the item.
    pub block_size: usize,
}

impl SourceMeta {
    /// A regular file of `length` bytes owned by uid/gid 0.
    pub fn file(length: u64) -> Self {
        Self { length, uid: 0, gid: 0, kind: EntryKind::File, block_size: DEFAULT_COPY_BUFFER }
    }

    pub fn from_metadata(meta: &Metadata) -> Self {
        let (kind, length) = if meta.is_dir() {
            (EntryKind::Directory, 0)
        } else {
            (EntryKind::File, meta.len())
        };

        #[cfg(unix)]
        let (uid, gid, block_size) = {
            use std::os::unix::fs::MetadataExt;
            let blksize = usize::try_from(meta.blksize()).unwrap_or(DEFAULT_COPY_BUFFER);
            (meta.uid(), meta.gid(), if blksize == 0 { DEFAULT_COPY_BUFFER } else { blksize })
        };
        #[cfg(not(unix))]
        let (uid, gid, block_size) = (0, 0, DEFAULT_COPY_BUFFER);

        Self { length, uid, gid, kind, block_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_metadata() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"twelve bytes").unwrap();
        let meta = SourceMeta::from_metadata(&file.as_file().metadata().unwrap());
        assert_eq!(meta.kind, EntryKind::File);
        assert_eq!(meta.length, 12);
        assert!(meta.block_size > 0);
    }

    #[test]
    fn test_directory_is_a_zero_length_marker() {
        let dir = tempfile::tempdir().unwrap();
        let meta = SourceMeta::from_metadata(&std::fs::metadata(dir.path()).unwrap());
        assert_eq!(meta.kind, EntryKind::Directory);
        assert_eq!(meta.length, 0);
    }
}
