//! Forward traversal of the index block chain.
//!
//! The walk starts at offset 0 and yields blocks in chain order.  A block is
//! handed to the caller before its chain-control slot is acted on; the next
//! call then either seeks forward to the following block, ends the walk, or
//! yields [`Corruption::ChainControl`] and halts.  A caller that stops early
//! never sees the verdict on the last block's chain slot.

use log::{debug, warn};
use std::io::{Read, Seek, SeekFrom};

use crate::block::{read_block, Block, ChainControl};
use crate::error::{ArchiveError, Corruption, Result};

/// One block produced by the walk.
#[derive(Debug, Clone)]
pub struct WalkedBlock {
    /// Absolute offset of the block's first byte.
    pub offset:  u64,
    /// Zero-based position of the block in the chain.
    pub ordinal: usize,
    pub block:   Block,
}

enum WalkState {
    Start,
    Follow(ChainControl),
    Broken(Corruption),
    Halted,
}

pub struct IndexWalker<'a, S: ?Sized> {
    store:   &'a mut S,
    state:   WalkState,
    ordinal: usize,
}

impl<'a, S: Read + Seek + ?Sized> IndexWalker<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store, state: WalkState::Start, ordinal: 0 }
    }

    fn advance(&mut self) -> Result<Option<WalkedBlock>> {
        match std::mem::replace(&mut self.state, WalkState::Halted) {
            WalkState::Halted => return Ok(None),
            WalkState::Broken(corruption) => {
                return Err(ArchiveError::ArchiveIndexCorrupt(corruption));
            }
            WalkState::Follow(ChainControl::End) => return Ok(None),
            WalkState::Start => {
                self.store.seek(SeekFrom::Start(0))?;
            }
            WalkState::Follow(ChainControl::Continue { distance }) => {
                let delta = i64::try_from(distance)
                    .map_err(|_| Corruption::DistanceOverflow(distance))?;
                self.store.seek(SeekFrom::Current(delta))?;
            }
        }

        let offset = self.store.stream_position()?;
        let block = read_block(self.store)?;
        let ordinal = self.ordinal;
        self.ordinal += 1;

        self.state = match block.chain_control() {
            Ok(chain) => {
                debug!("block {ordinal} at {offset:#x}: {chain:?}");
                WalkState::Follow(chain)
            }
            Err(corruption) => {
                warn!("block {ordinal} at {offset:#x}: {corruption}");
                WalkState::Broken(corruption)
            }
        };

        Ok(Some(WalkedBlock { offset, ordinal, block }))
    }
}

impl<S: Read + Seek + ?Sized> Iterator for IndexWalker<'_, S> {
    type Item = Result<WalkedBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}
