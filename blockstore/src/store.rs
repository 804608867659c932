use crate::alloc::{Bitmap, State};

use log::debug;
use std::collections::TryReserveError;
use std::fmt;
use thiserror::Error;

/// The block number to access ranging from 0 (the first block) to n - 1 (the last
/// block) where n is number of blocks available.
pub type BlockId = usize;

pub type Result<T> = std::result::Result<T, BlockStoreError>;

#[derive(Error, Debug)]
pub enum BlockStoreError {
    #[error("block {0} is out of range")]
    OutOfRange(BlockId),
    #[error("no free blocks remain")]
    StoreFull,
    #[error("block {0} is already allocated")]
    AlreadyAllocated(BlockId),
    #[error("buffer of {len} bytes cannot hold a {block_size} byte block")]
    BufferTooSmall { len: usize, block_size: usize },
    #[error("could not allocate block storage")]
    AllocationFailure(#[from] TryReserveError),
    #[error("store image I/O failed")]
    Io(#[from] std::io::Error),
    #[error("invalid store image: {0}")]
    InvalidImage(String),
}

/// A fixed array of `N` blocks of `B` bytes each, with a bitmap recording which
/// blocks are in use.
///
/// Allocation and storage are independent: `read` and `write` never consult the
/// bitmap, and writing a block does not mark it used. Callers pair `allocate` or
/// `request` with `write` themselves. The store has no internal locking; sharing
/// it across threads means wrapping the whole store in one lock.
#[derive(Clone)]
pub struct BlockStore<const N: usize = 256, const B: usize = 256> {
    pub(crate) blocks: Box<[[u8; B]]>,
    pub(crate) bitmap: Bitmap,
}

impl<const N: usize, const B: usize> BlockStore<N, B> {
    /// Total number of blocks in the store.
    pub const BLOCK_COUNT: usize = N;
    /// Size of every block in bytes.
    pub const BLOCK_SIZE: usize = B;

    /// Creates an empty store: every block zeroed and free.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if memory for the block array or the bitmap
    /// cannot be reserved. No partially built store is ever returned.
    pub fn create() -> Result<Self> {
        const { assert!(N > 0 && B > 0, "a block store needs at least one non-empty block") };

        let mut blocks = Vec::new();
        blocks.try_reserve_exact(N)?;
        blocks.resize(N, [0; B]);

        Ok(Self {
            blocks: blocks.into_boxed_slice(),
            bitmap: Bitmap::new(N)?,
        })
    }

    /// Releases the block array and bitmap together.
    pub fn destroy(self) {
        debug!("destroying store with {} of {} blocks in use", self.used_count(), N);
    }

    /// Marks the lowest free block as used and returns it.
    pub fn allocate(&mut self) -> Result<BlockId> {
        let id = self.bitmap.first_clear().ok_or(BlockStoreError::StoreFull)?;
        self.bitmap.set(id);
        debug!("allocated block {}", id);
        Ok(id)
    }

    /// Reserves a specific block. Nothing changes unless the block is in range
    /// and currently free.
    pub fn request(&mut self, id: BlockId) -> Result<()> {
        self.check_range(id)?;
        if self.bitmap.test(id) {
            return Err(BlockStoreError::AlreadyAllocated(id));
        }
        self.bitmap.set(id);
        debug!("reserved block {}", id);
        Ok(())
    }

    /// Marks a block free. Out of range ids and already free blocks are ignored.
    pub fn release(&mut self, id: BlockId) {
        if id < N {
            self.bitmap.reset(id);
            debug!("released block {}", id);
        }
    }

    /// Whether `id` is in range and allocated.
    pub fn is_allocated(&self, id: BlockId) -> bool {
        id < N && self.bitmap.test(id)
    }

    /// The allocation state of `id`, or `None` when it is out of range.
    pub fn state(&self, id: BlockId) -> Option<State> {
        if id < N {
            Some(self.bitmap.get(id))
        } else {
            None
        }
    }

    /// Allocated block ids in ascending order.
    pub fn allocated(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..N).filter(move |&id| self.bitmap.test(id))
    }

    pub fn used_count(&self) -> usize {
        self.bitmap.count_set()
    }

    pub fn free_count(&self) -> usize {
        N - self.bitmap.count_set()
    }

    pub fn total_count() -> usize {
        N
    }

    /// Copies block `id` into the first `B` bytes of `buf` and returns the number
    /// of bytes copied. Unallocated blocks are read like any other.
    ///
    /// # Errors
    ///
    /// Attempting to read a block out of range, or into a buffer smaller than a
    /// block, will return an error.
    pub fn read(&self, id: BlockId, buf: &mut [u8]) -> Result<usize> {
        let block = self.blocks.get(id).ok_or(BlockStoreError::OutOfRange(id))?;
        let len = buf.len();
        let dest = buf.get_mut(..B).ok_or(BlockStoreError::BufferTooSmall {
            len,
            block_size: B,
        })?;
        dest.copy_from_slice(block);
        Ok(B)
    }

    /// Overwrites block `id` with the first `B` bytes of `buf` and returns the
    /// number of bytes copied. The allocation bitmap is left untouched.
    ///
    /// # Errors
    ///
    /// Attempting to write a block out of range, or from a buffer smaller than a
    /// block, will return an error.
    pub fn write(&mut self, id: BlockId, buf: &[u8]) -> Result<usize> {
        let block = self
            .blocks
            .get_mut(id)
            .ok_or(BlockStoreError::OutOfRange(id))?;
        let src = buf.get(..B).ok_or(BlockStoreError::BufferTooSmall {
            len: buf.len(),
            block_size: B,
        })?;
        block.copy_from_slice(src);
        Ok(B)
    }

    fn check_range(&self, id: BlockId) -> Result<()> {
        if id < N {
            Ok(())
        } else {
            Err(BlockStoreError::OutOfRange(id))
        }
    }
}

impl<const N: usize, const B: usize> fmt::Debug for BlockStore<N, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockStore")
            .field("block_count", &N)
            .field("block_size", &B)
            .field("used", &self.used_count())
            .finish()
    }
}
