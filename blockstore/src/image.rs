use crate::alloc::Bitmap;
use crate::header::ImageHeader;
use crate::store::{BlockStore, Result};

use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// How a store is laid out on disk.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum Layout {
    /// `N * B` bytes of block data and nothing else. Unallocated blocks are
    /// written as zeros, and on load any block holding a non-zero byte is marked
    /// allocated. An allocated block whose contents are all zero therefore comes
    /// back free.
    #[default]
    ZeroConvention,
    /// An `ImageHeader`, the packed allocation bitmap, then every block verbatim.
    Snapshot,
}

impl<const N: usize, const B: usize> BlockStore<N, B> {
    /// Writes the store to `path` in the zero convention layout, creating or
    /// truncating the file, and returns the number of bytes written.
    ///
    /// A failure part way through may leave a partially written file behind.
    pub fn serialize<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        self.serialize_with(path, Layout::default())
    }

    pub fn serialize_with<P: AsRef<Path>>(&self, path: P, layout: Layout) -> Result<usize> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        let written = self.write_to(&mut writer, layout).map_err(|e| {
            warn!("failed writing store image {}: {}", path.display(), e);
            e
        })?;
        // Flush any buffered blocks and make sure they reached the disk before
        // reporting success.
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        info!(
            "wrote {} bytes of store image to {} ({:?})",
            written,
            path.display(),
            layout
        );
        Ok(written)
    }

    /// Streams the store into `dest` and returns the number of bytes written.
    pub fn write_to<W: Write>(&self, dest: &mut W, layout: Layout) -> Result<usize> {
        let mut written = 0;
        match layout {
            Layout::ZeroConvention => {
                let zero_block = [0; B];
                for (id, block) in self.blocks.iter().enumerate() {
                    if self.bitmap.test(id) {
                        dest.write_all(block)?;
                    } else {
                        dest.write_all(&zero_block)?;
                    }
                    written += B;
                }
            }
            Layout::Snapshot => {
                let header = ImageHeader::new(N, B);
                dest.write_all(header.serialize())?;
                written += ImageHeader::SIZE;

                let bitmap = self.bitmap.serialize();
                dest.write_all(&bitmap)?;
                written += bitmap.len();

                for block in self.blocks.iter() {
                    dest.write_all(block)?;
                    written += B;
                }
            }
        }
        dest.flush()?;
        debug!("streamed {} blocks ({} bytes) as {:?}", N, written, layout);
        Ok(written)
    }

    /// Loads a store written in the zero convention layout.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or holds fewer than `N * B` bytes.
    pub fn deserialize<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::deserialize_with(path, Layout::default())
    }

    pub fn deserialize_with<P: AsRef<Path>>(path: P, layout: Layout) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let store = Self::read_from(&mut BufReader::new(file), layout).map_err(|e| {
            warn!("failed loading store image {}: {}", path.display(), e);
            e
        })?;
        info!(
            "loaded store image {} ({:?}) with {} blocks in use",
            path.display(),
            layout,
            store.used_count()
        );
        Ok(store)
    }

    /// Builds a store from an image read out of `src`. Bytes following the
    /// image are left unread.
    pub fn read_from<R: Read>(src: &mut R, layout: Layout) -> Result<Self> {
        let mut store = Self::create()?;
        match layout {
            Layout::ZeroConvention => {
                let mut buf = [0; B];
                for id in 0..N {
                    src.read_exact(&mut buf)?;
                    store.write(id, &buf)?;
                    if buf.iter().any(|&byte| byte != 0) {
                        store.request(id)?;
                    }
                }
            }
            Layout::Snapshot => {
                let mut header_buf = [0; ImageHeader::SIZE];
                src.read_exact(&mut header_buf)?;
                ImageHeader::parse(&header_buf)?.expect_geometry(N, B)?;

                let mut bitmap_buf = vec![0; N.div_ceil(8)];
                src.read_exact(&mut bitmap_buf)?;
                let bitmap = Bitmap::parse(N, &bitmap_buf)?;

                for block in store.blocks.iter_mut() {
                    src.read_exact(block)?;
                }
                store.bitmap = bitmap;
            }
        }
        debug!("rebuilt store with {} of {} blocks in use", store.used_count(), N);
        Ok(store)
    }
}
