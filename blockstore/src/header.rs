use crate::store::{BlockStoreError, Result};

use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A 32-bit identifying string, in this case BSTR.
pub const IMAGE_MAGIC: u32 = 0x4253_5452;

/// Leads a snapshot image and records the geometry of the store that wrote it.
/// The fields are little endian and unaligned so the header can be read straight
/// out of a byte buffer.
#[repr(C)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct ImageHeader {
    magic: U32,
    block_count: U64,
    block_size: U64,
}

impl ImageHeader {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(block_count: usize, block_size: usize) -> Self {
        Self {
            magic: U32::new(IMAGE_MAGIC),
            block_count: U64::new(block_count as u64),
            block_size: U64::new(block_size as u64),
        }
    }

    pub fn block_count(&self) -> u64 {
        self.block_count.get()
    }

    pub fn block_size(&self) -> u64 {
        self.block_size.get()
    }

    /// Reads a header from a buffer of exactly `ImageHeader::SIZE` bytes.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let header = Self::read_from_bytes(buf).map_err(|_| {
            BlockStoreError::InvalidImage(format!(
                "header must be {} bytes, got {}",
                Self::SIZE,
                buf.len()
            ))
        })?;
        if header.magic.get() != IMAGE_MAGIC {
            return Err(BlockStoreError::InvalidImage(format!(
                "bad magic {:#010x}",
                header.magic.get()
            )));
        }
        Ok(header)
    }

    /// Checks the header describes a store of `block_count` blocks of
    /// `block_size` bytes.
    pub fn expect_geometry(&self, block_count: usize, block_size: usize) -> Result<()> {
        if self.block_count() != block_count as u64 || self.block_size() != block_size as u64 {
            return Err(BlockStoreError::InvalidImage(format!(
                "image holds {} blocks of {} bytes, expected {} blocks of {} bytes",
                self.block_count(),
                self.block_size(),
                block_count,
                block_size
            )));
        }
        Ok(())
    }

    pub fn serialize(&self) -> &[u8] {
        self.as_bytes()
    }
}
