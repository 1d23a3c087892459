//! Block codec — one fixed-size index block at the current stream position.
//!
//! # Block layout (little-endian)
//!
//! | Offset | Size            | Field                          |
//! |--------|-----------------|--------------------------------|
//! | 0      | 2               | magic `0x4242`                 |
//! | 2      | 15 × SLOT_SIZE  | usable entry slots 0..=14      |
//! | 4322   | SLOT_SIZE       | chain-control slot 15          |
//!
//! Every block has the same encoded size, so blocks can be reached with
//! fixed-offset seeks.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use log::debug;
use std::io::{Read, Write};

use crate::error::{ArchiveError, Corruption, Result};
use crate::index::{IndexSlot, SlotStatus, SLOT_SIZE};
use crate::io_stream::{read_full, write_full, Durable};

pub const BLOCK_MAGIC: u16 = 0x4242;
pub const SLOTS_PER_BLOCK: usize = 16;
/// Index of the slot reserved for chain control.
pub const CHAIN_SLOT: usize = SLOTS_PER_BLOCK - 1;
/// Slots 0..USABLE_SLOTS may hold entries.
pub const USABLE_SLOTS: usize = CHAIN_SLOT;
pub const BLOCK_SIZE: usize = 2 + SLOTS_PER_BLOCK * SLOT_SIZE;

/// Decoded meaning of a block's chain-control slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainControl {
    /// Another block starts `distance` bytes past the end of this one.
    Continue { distance: u64 },
    /// This is the last block of the archive.
    End,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    slots: [IndexSlot; SLOTS_PER_BLOCK],
}

impl Block {
    /// A block with every entry slot free and the chain terminated here.
    pub fn empty() -> Self {
        let mut block = Self::default();
        block.set_chain(ChainControl::End);
        block
    }

    /// The usable entry slots, in allocation order.
    pub fn entries(&self) -> &[IndexSlot] {
        &self.slots[..USABLE_SLOTS]
    }

    /// Mutable access to an entry slot.  The chain-control slot is not
    /// reachable through this method.
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut IndexSlot> {
        self.slots[..USABLE_SLOTS].get_mut(index)
    }

    pub fn chain_slot(&self) -> &IndexSlot {
        &self.slots[CHAIN_SLOT]
    }

    pub fn chain_control(&self) -> Result<ChainControl, Corruption> {
        let slot = self.chain_slot();
        match slot.status {
            SlotStatus::Continue => Ok(ChainControl::Continue { distance: slot.position }),
            SlotStatus::Eoa      => Ok(ChainControl::End),
            other                => Err(Corruption::ChainControl(other)),
        }
    }

    pub fn set_chain(&mut self, chain: ChainControl) {
        let slot = &mut self.slots[CHAIN_SLOT];
        *slot = IndexSlot::default();
        match chain {
            ChainControl::Continue { distance } => {
                slot.status   = SlotStatus::Continue;
                slot.position = distance;
            }
            ChainControl::End => slot.status = SlotStatus::Eoa,
        }
    }

    /// Index of the first free entry slot, if any.
    pub fn first_free(&self) -> Option<usize> {
        self.entries().iter().position(|s| s.status == SlotStatus::Free)
    }

    /// Encode with the magic stamped in front.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        LittleEndian::write_u16(&mut buf[..2], BLOCK_MAGIC);
        for (slot, dst) in self.slots.iter().zip(buf[2..].chunks_exact_mut(SLOT_SIZE)) {
            dst.copy_from_slice(&slot.encode());
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < BLOCK_SIZE {
            return Err(ArchiveError::UnexpectedEof {
                expected: BLOCK_SIZE as u64,
                actual:   buf.len() as u64,
            });
        }
        let mut cursor = buf;
        let found = cursor.read_u16::<LittleEndian>()?;
        if found != BLOCK_MAGIC {
            return Err(ArchiveError::MagicCorrupt { found });
        }
        let mut block = Self::default();
        for slot in block.slots.iter_mut() {
            *slot = IndexSlot::read(&mut cursor)?;
        }
        Ok(block)
    }
}

/// Read one block from the current position, leaving the cursor right after it.
pub fn read_block<R: Read + ?Sized>(reader: &mut R) -> Result<Block> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    let got = read_full(reader, &mut buf)?;
    if got != BLOCK_SIZE {
        return Err(ArchiveError::UnexpectedEof {
            expected: BLOCK_SIZE as u64,
            actual:   got as u64,
        });
    }
    Block::decode(&buf)
}

/// Write one block at the current position and make it durable.
pub fn write_block<W: Write + Durable + ?Sized>(writer: &mut W, block: &Block) -> Result<()> {
    write_full(writer, &block.encode())?;
    writer.flush()?;
    writer.sync()?;
    debug!("wrote index block ({} bytes), synced", BLOCK_SIZE);
    Ok(())
}
