//! A fixed-capacity block store: `N` equally sized blocks plus a bitmap tracking
//! which of them are in use, with whole-store persistence to a backing file.
//!
//! ```
//! use blockstore::BlockStore;
//!
//! let mut store = BlockStore::<8, 4>::create().unwrap();
//! let id = store.allocate().unwrap();
//! store.write(id, &[1, 2, 3, 4]).unwrap();
//!
//! let mut buf = [0; 4];
//! store.read(id, &mut buf).unwrap();
//! assert_eq!(buf, [1, 2, 3, 4]);
//! ```
mod alloc;
mod header;
mod image;
mod store;

pub use crate::alloc::State;
pub use crate::header::{ImageHeader, IMAGE_MAGIC};
pub use crate::image::Layout;
pub use crate::store::{BlockId, BlockStore, BlockStoreError, Result};

/// Number of blocks in a `BlockStore` when no count is given.
pub const DEFAULT_BLOCK_COUNT: usize = 256;
/// Bytes per block in a `BlockStore` when no size is given.
pub const DEFAULT_BLOCK_SIZE: usize = 256;
