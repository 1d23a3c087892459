//! Slot allocation: first free entry slot in chain order, plus the offset at
//! which the next payload may be written.

use log::debug;
use std::io::{Read, Seek};

use crate::block::{Block, BLOCK_SIZE};
use crate::error::{Corruption, Result};
use crate::index::SlotStatus;
use crate::walker::IndexWalker;

#[derive(Debug, Clone)]
pub struct Allocation {
    /// Absolute offset of the block owning the selected slot.
    pub block_offset: u64,
    /// The owning block as read, for rewriting once the slot is filled.
    pub block:        Block,
    /// Selected entry slot, always below the chain-control slot.
    pub slot:         usize,
    /// Absolute offset where the new payload starts.
    pub data_offset:  u64,
}

/// Find the lowest free entry slot in the chain.
///
/// The whole chain is walked even after a free slot turns up.  The data
/// offset is the furthest end of everything in the archive: every occupied
/// entry's `position + length` and the end of every block.  Free and
/// continuation slots are skipped, a continuation's `position` is a seek
/// distance and not an extent.  A new payload therefore never lands on an
/// existing payload or on an index block.
///
/// A chain with no free slot fails with [`Corruption::NoFreeSlot`]; the
/// engine never grows the chain.
pub fn allocate<S: Read + Seek + ?Sized>(store: &mut S) -> Result<Allocation> {
    let mut data_offset = BLOCK_SIZE as u64;
    let mut selected: Option<(u64, usize, Block, usize)> = None;

    for walked in IndexWalker::new(store) {
        let walked = walked?;
        data_offset = data_offset.max(walked.offset + BLOCK_SIZE as u64);

        for slot in walked.block.entries() {
            match slot.status {
                SlotStatus::Free | SlotStatus::Continue => {}
                _ => data_offset = data_offset.max(slot.end()?),
            }
        }

        if selected.is_none() {
            if let Some(slot) = walked.block.first_free() {
                selected = Some((walked.offset, walked.ordinal, walked.block, slot));
            }
        }
    }

    let (block_offset, ordinal, block, slot) = selected.ok_or(Corruption::NoFreeSlot)?;
    debug!(
        "allocated slot {slot} of block {ordinal} at {block_offset:#x}, data at {data_offset:#x}"
    );
    Ok(Allocation { block_offset, block, slot, data_offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{write_block, ChainControl, USABLE_SLOTS};
    use crate::error::ArchiveError;
    use crate::index::IndexSlot;
    use std::io::{Cursor, Seek, SeekFrom};

    fn occupied(position: u64, length: u64) -> IndexSlot {
        IndexSlot { status: SlotStatus::Actual, position, length, ..Default::default() }
    }

    fn single(block: &Block) -> Cursor<Vec<u8>> {
        let mut store = Cursor::new(Vec::new());
        write_block(&mut store, block).unwrap();
        store
    }

    #[test]
    fn test_fresh_block_allocates_slot_zero_after_index() {
        let alloc = allocate(&mut single(&Block::empty())).unwrap();
        assert_eq!(alloc.block_offset, 0);
        assert_eq!(alloc.slot, 0);
        assert_eq!(alloc.data_offset, BLOCK_SIZE as u64);
    }

    #[test]
    fn test_first_fit_after_occupied_prefix() {
        let mut block = Block::empty();
        let base = BLOCK_SIZE as u64;
        *block.entry_mut(0).unwrap() = occupied(base, 10);
        *block.entry_mut(1).unwrap() = occupied(base + 10, 0);
        *block.entry_mut(2).unwrap() = occupied(base + 10, 5);
        // Slot 5 is occupied but sits after the first hole.
        *block.entry_mut(5).unwrap() = occupied(base + 1000, 5);

        let alloc = allocate(&mut single(&block)).unwrap();
        assert_eq!(alloc.slot, 3);
        assert_eq!(alloc.data_offset, base + 1005);
    }

    #[test]
    fn test_entries_after_the_hole_are_not_overwritten() {
        let mut block = Block::empty();
        let base = BLOCK_SIZE as u64;
        *block.entry_mut(0).unwrap() = occupied(base, 1);
        *block.entry_mut(1).unwrap() = occupied(base + 1, 1);
        *block.entry_mut(2).unwrap() = occupied(base + 2, 1);
        *block.entry_mut(5).unwrap() = occupied(base + 3, 4);

        let alloc = allocate(&mut single(&block)).unwrap();
        assert_eq!(alloc.slot, 3);
        assert_eq!(alloc.data_offset, base + 7);
    }

    #[test]
    fn test_later_blocks_count_toward_data_offset() {
        let base = BLOCK_SIZE as u64;
        let mut first = Block::empty();
        first.set_chain(ChainControl::Continue { distance: 0 });
        let mut second = Block::empty();
        *second.entry_mut(0).unwrap() = occupied(2 * base, 9);

        let mut store = Cursor::new(Vec::new());
        write_block(&mut store, &first).unwrap();
        write_block(&mut store, &second).unwrap();

        let alloc = allocate(&mut store).unwrap();
        assert_eq!((alloc.block_offset, alloc.slot), (0, 0));
        assert_eq!(alloc.data_offset, 2 * base + 9);
    }

    #[test]
    fn test_unknown_status_counts_as_occupied() {
        let mut block = Block::empty();
        let base = BLOCK_SIZE as u64;
        *block.entry_mut(0).unwrap() = IndexSlot { status: SlotStatus::Unknown(7), ..occupied(base, 20) };

        let alloc = allocate(&mut single(&block)).unwrap();
        assert_eq!(alloc.slot, 1);
        assert_eq!(alloc.data_offset, base + 20);
    }

    #[test]
    fn test_corrupt_chain_after_free_slot_fails() {
        let mut block = Block::empty();
        block.set_chain(ChainControl::Continue { distance: 0 });
        match allocate(&mut single(&block)) {
            Err(ArchiveError::UnexpectedEof { .. }) => {}
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn test_data_offset_is_running_maximum() {
        let mut block = Block::empty();
        let base = BLOCK_SIZE as u64;
        *block.entry_mut(0).unwrap() = occupied(base + 100, 50);
        *block.entry_mut(1).unwrap() = occupied(base, 10);

        let alloc = allocate(&mut single(&block)).unwrap();
        assert_eq!(alloc.slot, 2);
        assert_eq!(alloc.data_offset, base + 150);
    }

    #[test]
    fn test_reserved_statuses_are_not_reused() {
        let mut block = Block::empty();
        let base = BLOCK_SIZE as u64;
        *block.entry_mut(0).unwrap() = IndexSlot { status: SlotStatus::Deleted, ..occupied(base, 4) };
        *block.entry_mut(1).unwrap() = IndexSlot { status: SlotStatus::Replaced, ..occupied(base + 4, 4) };

        let alloc = allocate(&mut single(&block)).unwrap();
        assert_eq!(alloc.slot, 2);
        assert_eq!(alloc.data_offset, base + 8);
    }

    #[test]
    fn test_full_single_block_fails() {
        let mut block = Block::empty();
        for i in 0..USABLE_SLOTS {
            *block.entry_mut(i).unwrap() = occupied(BLOCK_SIZE as u64 + i as u64, 1);
        }
        match allocate(&mut single(&block)) {
            Err(ArchiveError::ArchiveIndexCorrupt(Corruption::NoFreeSlot)) => {}
            other => panic!("expected NoFreeSlot, got {other:?}"),
        }
    }

    #[test]
    fn test_spills_into_chained_block() {
        let base = BLOCK_SIZE as u64;
        let mut first = Block::empty();
        for i in 0..USABLE_SLOTS {
            *first.entry_mut(i).unwrap() = occupied(base + 2 * i as u64, 2);
        }
        // The second block lives right after the first block's payloads.
        let gap = 2 * USABLE_SLOTS as u64;
        first.set_chain(ChainControl::Continue { distance: gap });
        let second_at = base + gap;

        let mut store = Cursor::new(Vec::new());
        write_block(&mut store, &first).unwrap();
        store.seek(SeekFrom::Start(second_at)).unwrap();
        write_block(&mut store, &Block::empty()).unwrap();

        let alloc = allocate(&mut store).unwrap();
        assert_eq!(alloc.block_offset, second_at);
        assert_eq!(alloc.slot, 0);
        assert_eq!(alloc.data_offset, second_at + base, "payload goes past the second block");
    }

    #[test]
    fn test_overflowing_extent_is_corrupt() {
        let mut block = Block::empty();
        *block.entry_mut(0).unwrap() = occupied(u64::MAX, 1);
        assert!(matches!(
            allocate(&mut single(&block)),
            Err(ArchiveError::ArchiveIndexCorrupt(Corruption::ExtentOverflow { .. }))
        ));
    }
}
