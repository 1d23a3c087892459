//! High-level [`Archive`] API — create, list, append, extract.
//!
//! ```no_run
//! use chainar::archive::{Archive, ArchiveOptions};
//!
//! let mut ar = Archive::create("out.car", ArchiveOptions::default())?;
//! ar.append_path("readme.txt")?;
//!
//! let mut ar = Archive::open_read_only("out.car", ArchiveOptions::default())?;
//! for entry in ar.entries()? {
//!     println!("{} {}", entry.length, entry.name);
//! }
//! # Ok::<(), chainar::ArchiveError>(())
//! ```
//!
//! # Single writer
//! The format has no locking.  An [`Archive`] assumes it is the only party
//! reading or writing the underlying file for as long as it exists; callers
//! sharing an archive between processes must serialise access themselves.
//!
//! # Failure atomicity
//! `append` writes the payload first and the index block last.  A failure in
//! between leaves unindexed bytes in the file; they are never reclaimed.

use log::{info, trace};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::alloc::allocate;
use crate::block::{write_block, Block};
use crate::error::{ArchiveError, Result};
use crate::index::{EntryKind, FileName, IndexSlot, SlotStatus};
use crate::io_stream::{copy_bytes, Durable, DEFAULT_COPY_BUFFER};
use crate::source::SourceMeta;
use crate::walker::IndexWalker;

// ── ArchiveOptions ────────────────────────────────────────────────────────────

/// Configuration shared by every [`Archive`] constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Transfer chunk for payload copies.  `None` uses the source's preferred
    /// I/O block size.
    pub copy_buffer: Option<usize>,
    /// Permission bits for newly created archives (Unix only).
    pub create_mode: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            copy_buffer: None,
            create_mode: 0o644,
        }
    }
}

// ── ListedEntry / Appended ────────────────────────────────────────────────────

/// One `ACTUAL` slot as reported by [`Archive::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedEntry {
    pub block:    usize,
    pub slot:     usize,
    pub status:   SlotStatus,
    pub uid:      u32,
    pub gid:      u32,
    pub kind:     EntryKind,
    pub name:     FileName,
    pub length:   u64,
    pub position: u64,
}

impl ListedEntry {
    fn new(block: usize, slot: usize, s: &IndexSlot) -> Self {
        Self {
            block,
            slot,
            status:   s.status,
            uid:      s.uid,
            gid:      s.gid,
            kind:     s.kind,
            name:     s.name.clone(),
            length:   s.length,
            position: s.position,
        }
    }
}

/// Where [`Archive::append_from`] put an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    pub block_offset: u64,
    pub slot:         usize,
    pub name:         FileName,
    pub kind:         EntryKind,
    pub length:       u64,
    pub position:     u64,
}

// ── Archive ───────────────────────────────────────────────────────────────────

pub struct Archive<S = File> {
    store:   S,
    options: ArchiveOptions,
}

impl Archive<File> {
    /// Create (or truncate) the archive at `path` holding one empty block.
    pub fn create<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut opts = OpenOptions::new();
        opts.read(true).write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(options.create_mode);
        }
        let file = opts.open(path).map_err(|source| ArchiveError::UnableToCreateArchive {
            path: path.to_owned(),
            source,
        })?;

        let mut archive = Self::from_store(file, options);
        archive.init()?;
        info!("new archive '{}' created", path.display());
        Ok(archive)
    }

    /// Open an existing archive for reading and appending.
    pub fn open<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| unable_to_open(path, source))?;
        Ok(Self::from_store(file, options))
    }

    pub fn open_read_only<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| unable_to_open(path, source))?;
        Ok(Self::from_store(file, options))
    }

    /// Store the file or directory at `input` under its final path component.
    pub fn append_path<P: AsRef<Path>>(&mut self, input: P) -> Result<Appended> {
        let input = input.as_ref();
        let file = File::open(input).map_err(|source| ArchiveError::UnableToOpenInput {
            path: input.to_owned(),
            source,
        })?;
        let name = FileName::from_path(input)?;
        let meta = SourceMeta::from_metadata(&file.metadata()?);
        self.append_from(name, meta, file)
    }
}

impl<S> Archive<S> {
    /// Wrap an already-open store.  Nothing is read or written.
    pub fn from_store(store: S, options: ArchiveOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: Read + Seek> Archive<S> {
    /// Walk the whole chain, calling `visit` for every `ACTUAL` slot in
    /// chain order.  Returns the number of blocks visited.
    pub fn list<F: FnMut(&ListedEntry)>(&mut self, mut visit: F) -> Result<usize> {
        let mut blocks = 0;
        for walked in IndexWalker::new(&mut self.store) {
            let walked = walked?;
            blocks += 1;
            for (index, slot) in walked.block.entries().iter().enumerate() {
                trace!("block {} slot {index}: {}", walked.ordinal, slot.status);
                if slot.status == SlotStatus::Actual {
                    visit(&ListedEntry::new(walked.ordinal, index, slot));
                }
            }
        }
        Ok(blocks)
    }

    pub fn entries(&mut self) -> Result<Vec<ListedEntry>> {
        let mut out = Vec::new();
        self.list(|e| out.push(e.clone()))?;
        Ok(out)
    }

    /// Stream the payload of the first `ACTUAL` entry named `name` into `dst`.
    /// Returns the number of bytes written.
    pub fn extract<W: Write + ?Sized>(&mut self, name: &[u8], dst: &mut W) -> Result<u64> {
        let mut found = None;
        self.list(|e| {
            if found.is_none() && e.name.as_bytes() == name {
                found = Some((e.position, e.length));
            }
        })?;
        let (position, length) = found.ok_or_else(|| {
            ArchiveError::InvalidArgument(format!(
                "no entry named '{}'",
                String::from_utf8_lossy(name)
            ))
        })?;

        self.store.seek(SeekFrom::Start(position))?;
        let buffer = self.options.copy_buffer.unwrap_or(DEFAULT_COPY_BUFFER);
        copy_bytes(dst, &mut self.store, length, buffer)?;
        Ok(length)
    }
}

impl<S: Read + Write + Seek + Durable> Archive<S> {
    /// Write one empty, chain-terminating block at offset 0.
    pub fn init(&mut self) -> Result<()> {
        self.store.seek(SeekFrom::Start(0))?;
        write_block(&mut self.store, &Block::empty())
    }

    /// Store `meta.length` bytes from `source` in the first free slot.
    ///
    /// Steps: allocate a slot, copy the payload to the data offset, then
    /// rewrite the owning block with the slot filled in.  Only the selected
    /// slot changes.
    pub fn append_from<R: Read>(
        &mut self,
        name:       FileName,
        meta:       SourceMeta,
        mut source: R,
    ) -> Result<Appended> {
        if name.is_empty() {
            return Err(ArchiveError::InvalidArgument("empty file name".to_string()));
        }

        let alloc = allocate(&mut self.store)?;

        self.store.seek(SeekFrom::Start(alloc.data_offset))?;
        let buffer = self.options.copy_buffer.unwrap_or(meta.block_size);
        copy_bytes(&mut self.store, &mut source, meta.length, buffer)?;

        let mut block = alloc.block;
        let slot = block.entry_mut(alloc.slot).ok_or_else(|| {
            ArchiveError::InvalidArgument(format!("slot {} is not an entry slot", alloc.slot))
        })?;
        *slot = IndexSlot {
            status:   SlotStatus::Actual,
            uid:      meta.uid,
            gid:      meta.gid,
            kind:     meta.kind,
            name:     name.clone(),
            length:   meta.length,
            position: alloc.data_offset,
        };

        self.store.seek(SeekFrom::Start(alloc.block_offset))?;
        write_block(&mut self.store, &block)?;

        info!(
            "appended '{}' ({} bytes) at {:#x}, slot {}",
            name, meta.length, alloc.data_offset, alloc.slot
        );
        Ok(Appended {
            block_offset: alloc.block_offset,
            slot:         alloc.slot,
            name,
            kind:         meta.kind,
            length:       meta.length,
            position:     alloc.data_offset,
        })
    }
}

fn unable_to_open(path: &Path, source: std::io::Error) -> ArchiveError {
    ArchiveError::UnableToOpenArchive { path: PathBuf::from(path), source }
}
