//! Index slot model — the 288-byte entry record repeated 16 times per block.
//!
//! # Entry record layout (little-endian)
//!
//! | Offset | Size | Field      |
//! |--------|------|------------|
//! | 0      | 4    | status     |
//! | 4      | 4    | owner id   |
//! | 8      | 4    | group id   |
//! | 12     | 4    | entry type |
//! | 16     | 256  | file name  |
//! | 272    | 8    | length     |
//! | 280    | 8    | position   |
//!
//! The file name is NUL-padded but may occupy all 256 bytes with no
//! terminator.  Length and position are fixed at 64 bits regardless of host.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::io::{Read, Write};
use std::ffi::OsStr;
use std::path::{Component, Path};

use crate::error::{ArchiveError, Corruption, Result};

/// Capacity of the file name field in bytes.
pub const MAX_FILENAME: usize = 256;
/// Encoded size of one [`IndexSlot`].
pub const SLOT_SIZE: usize = 4 + 4 + 4 + 4 + MAX_FILENAME + 8 + 8;

// ── SlotStatus ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    #[default]
    Free,
    Actual,
    /// Reserved. Nothing in the engine produces or consumes it.
    Deleted,
    /// Reserved. Nothing in the engine produces or consumes it.
    Replaced,
    /// Chain-control only: last block of the archive.
    Eoa,
    /// Chain-control only: `position` is the forward distance to the next block.
    Continue,
    /// A tag this engine does not know.  Kept so the slot re-encodes unchanged;
    /// it counts as occupied.
    Unknown(u32),
}

impl SlotStatus {
    pub fn to_tag(self) -> u32 {
        match self {
            SlotStatus::Free     => 0,
            SlotStatus::Actual   => 1,
            SlotStatus::Deleted  => 2,
            SlotStatus::Replaced => 3,
            SlotStatus::Eoa      => 4,
            SlotStatus::Continue => 5,
            SlotStatus::Unknown(tag) => tag,
        }
    }

    pub fn from_tag(tag: u32) -> Self {
        match tag {
            0 => SlotStatus::Free,
            1 => SlotStatus::Actual,
            2 => SlotStatus::Deleted,
            3 => SlotStatus::Replaced,
            4 => SlotStatus::Eoa,
            5 => SlotStatus::Continue,
            other => SlotStatus::Unknown(other),
        }
    }

    /// True for the two states that belong in the chain-control slot.
    pub fn is_chain_control(self) -> bool {
        matches!(self, SlotStatus::Eoa | SlotStatus::Continue)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unknown;
        f.pad(match self {
            SlotStatus::Free     => "FREE",
            SlotStatus::Actual   => "ACTUAL",
            SlotStatus::Deleted  => "DELETED",
            SlotStatus::Replaced => "REPLACED",
            SlotStatus::Eoa      => "EOA",
            SlotStatus::Continue => "CONTINUE",
            SlotStatus::Unknown(tag) => {
                unknown = format!("?{tag}");
                unknown.as_str()
            }
        })
    }
}

// ── EntryKind ─────────────────────────────────────────────────────────────────

/// What kind of item a slot describes.  Zero (the state of a fresh slot)
/// decodes as `Directory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Directory,
    File,
    /// Unrecognised type tag, carried through unchanged.
    Unknown(u32),
}

impl EntryKind {
    pub fn to_tag(self) -> u32 {
        match self {
            EntryKind::Directory => 0,
            EntryKind::File      => 1,
            EntryKind::Unknown(tag) => tag,
        }
    }

    pub fn from_tag(tag: u32) -> Self {
        match tag {
            0 => EntryKind::Directory,
            1 => EntryKind::File,
            other => EntryKind::Unknown(other),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unknown;
        f.pad(match self {
            EntryKind::Directory => "dir",
            EntryKind::File      => "file",
            EntryKind::Unknown(tag) => {
                unknown = format!("?{tag}");
                unknown.as_str()
            }
        })
    }
}

// ── FileName ──────────────────────────────────────────────────────────────────

/// Fixed-capacity file name as stored on disk.
///
/// Names longer than [`MAX_FILENAME`] bytes are rejected, never truncated.
/// Interior NUL bytes are rejected because NUL marks the end of the name.
#[derive(Clone, PartialEq, Eq)]
pub struct FileName {
    bytes: [u8; MAX_FILENAME],
}

impl FileName {
    pub fn new(name: &[u8]) -> Result<Self> {
        if name.len() > MAX_FILENAME {
            return Err(ArchiveError::NameTooLong { len: name.len(), max: MAX_FILENAME });
        }
        if name.contains(&0) {
            return Err(ArchiveError::InvalidArgument(
                "file name contains a NUL byte".to_string(),
            ));
        }
        let mut bytes = [0u8; MAX_FILENAME];
        bytes[..name.len()].copy_from_slice(name);
        Ok(Self { bytes })
    }

    /// The final component of `path`, as the archive stores it.  A trailing
    /// `.` or `..` is stored literally; a bare root has no name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let component = match path.components().next_back() {
            Some(Component::Normal(name)) => name,
            Some(Component::CurDir)       => OsStr::new("."),
            Some(Component::ParentDir)    => OsStr::new(".."),
            _ => {
                return Err(ArchiveError::InvalidArgument(format!(
                    "'{}' has no final path component",
                    path.display()
                )))
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            Self::new(component.as_bytes())
        }
        #[cfg(not(unix))]
        {
            Self::new(component.to_string_lossy().as_bytes())
        }
    }

    /// The name without NUL padding.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(MAX_FILENAME);
        &self.bytes[..end]
    }

    pub fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    fn raw(&self) -> &[u8; MAX_FILENAME] {
        &self.bytes
    }

    /// Bytes after the first NUL are not part of the name and are dropped so
    /// that equal names compare equal.
    fn from_raw(mut bytes: [u8; MAX_FILENAME]) -> Self {
        if let Some(end) = bytes.iter().position(|&b| b == 0) {
            bytes[end..].fill(0);
        }
        Self { bytes }
    }
}

impl Default for FileName {
    fn default() -> Self {
        Self { bytes: [0u8; MAX_FILENAME] }
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileName({:?})", self.to_string_lossy())
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_string_lossy())
    }
}

impl Serialize for FileName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}

// ── IndexSlot ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSlot {
    pub status:   SlotStatus,
    pub uid:      u32,
    pub gid:      u32,
    pub kind:     EntryKind,
    pub name:     FileName,
    pub length:   u64,
    pub position: u64,
}

impl IndexSlot {
    /// Absolute offset one past this entry's payload bytes.
    pub fn end(&self) -> Result<u64, Corruption> {
        self.position
            .checked_add(self.length)
            .ok_or(Corruption::ExtentOverflow { position: self.position, length: self.length })
    }

    /// The 288-byte on-disk record.
    pub fn encode(&self) -> [u8; SLOT_SIZE] {
        const NAME: usize = 16;
        const LENGTH: usize = NAME + MAX_FILENAME;
        const POSITION: usize = LENGTH + 8;

        let mut buf = [0u8; SLOT_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.status.to_tag());
        LittleEndian::write_u32(&mut buf[4..8], self.uid);
        LittleEndian::write_u32(&mut buf[8..12], self.gid);
        LittleEndian::write_u32(&mut buf[12..NAME], self.kind.to_tag());
        buf[NAME..LENGTH].copy_from_slice(self.name.raw());
        LittleEndian::write_u64(&mut buf[LENGTH..POSITION], self.length);
        LittleEndian::write_u64(&mut buf[POSITION..], self.position);
        buf
    }

    pub fn write<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        writer.write_all(&self.encode())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let status = SlotStatus::from_tag(reader.read_u32::<LittleEndian>()?);
        let uid    = reader.read_u32::<LittleEndian>()?;
        let gid    = reader.read_u32::<LittleEndian>()?;
        let kind   = EntryKind::from_tag(reader.read_u32::<LittleEndian>()?);
        let mut name = [0u8; MAX_FILENAME];
        reader.read_exact(&mut name)?;
        Ok(Self {
            status,
            uid,
            gid,
            kind,
            name:     FileName::from_raw(name),
            length:   reader.read_u64::<LittleEndian>()?,
            position: reader.read_u64::<LittleEndian>()?,
        })
    }
}
