//! Low-level stream plumbing — partial-I/O loops and the payload copier.
//!
//! # Partial I/O
//! A `read` or `write` call may transfer fewer bytes than asked for.  The
//! helpers here keep calling until the request is satisfied, the source is
//! exhausted, or the call fails.  `Interrupted` is retried; any other error
//! is returned as-is.
//!
//! # Durability
//! [`Durable`] is the seam for "force written bytes to stable storage".
//! Files implement it with `fsync`; in-memory cursors treat it as a no-op so
//! the engine can be driven entirely from memory in tests.

use log::trace;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};

use crate::error::{ArchiveError, Result};

/// Transfer chunk used when a source does not report a preferred block size.
pub const DEFAULT_COPY_BUFFER: usize = 8 * 1024;

// ── Durable ──────────────────────────────────────────────────────────────────

pub trait Durable {
    /// Block until previously written bytes are on stable storage.
    fn sync(&mut self) -> io::Result<()>;
}

impl Durable for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl Durable for Cursor<Vec<u8>> {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Durable for Cursor<&mut Vec<u8>> {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: Durable + ?Sized> Durable for &mut D {
    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

// ── Partial-I/O loops ────────────────────────────────────────────────────────

/// Fill `buf` from `reader`, stopping early only at end of stream.
/// Returns the number of bytes read.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0)  => break,
            Ok(n)  => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Write all of `buf`.  A write that accepts zero bytes is reported as
/// [`ArchiveError::UnexpectedWriteError`] rather than looping forever.
pub fn write_full<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0)  => return Err(ArchiveError::UnexpectedWriteError),
            Ok(n)  => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

// ── Payload copier ───────────────────────────────────────────────────────────

/// Relay exactly `count` bytes from `src` to `dst` through a scratch buffer
/// of `buffer_size` bytes.
///
/// Each round reads `min(buffer_size, remaining)` bytes and writes back
/// exactly what was read, so no byte past `count` is ever consumed from
/// `src`.  A source that runs dry before `count` bytes have been relayed is
/// [`ArchiveError::UnexpectedEof`]; bytes relayed up to that point stay
/// written.
pub fn copy_bytes<W, R>(dst: &mut W, src: &mut R, count: u64, buffer_size: usize) -> Result<()>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    if buffer_size == 0 {
        return Err(ArchiveError::InvalidArgument("copy buffer size must be non-zero".to_string()));
    }

    let mut buffer = vec![0u8; usize::try_from(count).map_or(buffer_size, |c| c.min(buffer_size))];
    let mut remaining = count;

    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(buffer.len(), |r| r.min(buffer.len()));
        let got = read_full(src, &mut buffer[..want])?;
        if got == 0 {
            return Err(ArchiveError::UnexpectedEof { expected: count, actual: count - remaining });
        }
        write_full(dst, &buffer[..got])?;
        remaining -= got as u64;
        trace!("relayed {got} bytes, {remaining} remaining");
    }
    Ok(())
}
