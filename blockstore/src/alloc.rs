use std::collections::TryReserveError;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    Free,
    Used,
}

/// Tracks which of a fixed number of blocks are in use, one bit per block.
///
/// Bits are packed into 64-bit words with block `i` stored in word `i / 64` at
/// bit position `i % 64`. Bits past `len` in the final word are never set.
/// Block numbers at or past `len` panic; `BlockStore` range checks every id
/// before it gets here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bitmap {
    words: Vec<u64>,
    /// The number of blocks tracked.
    len: usize,
}

impl Bitmap {
    /// Creates a bitmap tracking `len` blocks, all of them free.
    pub fn new(len: usize) -> Result<Self, TryReserveError> {
        let word_count = len.div_ceil(64);
        let mut words = Vec::new();
        words.try_reserve_exact(word_count)?;
        words.resize(word_count, 0);
        Ok(Self { words, len })
    }

    pub fn get(&self, blocknr: usize) -> State {
        assert!(blocknr < self.len, "bit {} outside bitmap of {}", blocknr, self.len);
        let inner_offset = blocknr % 64;
        let mask = 0b01_u64 << inner_offset;
        match (self.words[blocknr / 64] & mask) >> inner_offset {
            0 => State::Free,
            1 => State::Used,
            _ => unreachable!("masked bit was neither 0 nor 1"),
        }
    }

    pub fn test(&self, blocknr: usize) -> bool {
        self.get(blocknr) == State::Used
    }

    pub fn set(&mut self, blocknr: usize) {
        assert!(blocknr < self.len, "bit {} outside bitmap of {}", blocknr, self.len);
        self.words[blocknr / 64] |= 0b01_u64 << (blocknr % 64);
    }

    pub fn reset(&mut self, blocknr: usize) {
        assert!(blocknr < self.len, "bit {} outside bitmap of {}", blocknr, self.len);
        self.words[blocknr / 64] &= !(0b01_u64 << (blocknr % 64));
    }

    /// Returns the lowest free block, or `None` when every block is used.
    pub fn first_clear(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)
            .map(|(i, word)| i * 64 + word.trailing_ones() as usize)
            // The tail of the last word is always clear, so a hit there may
            // still be past the end of the bitmap.
            .filter(|&blocknr| blocknr < self.len)
    }

    pub fn count_set(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Packs the bitmap into `ceil(len / 8)` bytes, block `i` at byte `i / 8`
    /// and bit position `i % 8`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut encoded: Vec<u8> = self
            .words
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        encoded.truncate(self.len.div_ceil(8));
        encoded
    }

    /// Reads a bitmap of `len` blocks from its packed form. Bits past `len` are
    /// dropped. Passing fewer than `ceil(len / 8)` bytes results in a panic.
    pub fn parse(len: usize, buf: &[u8]) -> Result<Self, TryReserveError> {
        let byte_len = len.div_ceil(8);
        assert!(buf.len() >= byte_len, "Bitmap buffer shorter than {} bytes.", byte_len);

        let mut bitmap = Self::new(len)?;
        for (i, chunk) in buf[..byte_len].chunks(8).enumerate() {
            let mut word = [0; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            bitmap.words[i] = u64::from_le_bytes(word);
        }
        if len % 64 != 0 {
            if let Some(last) = bitmap.words.last_mut() {
                *last &= (1_u64 << (len % 64)) - 1;
            }
        }
        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_read_and_write_values_to_bitmap() {
        let mut bmp = Bitmap::new(128).unwrap();

        bmp.set(2);

        assert_eq!(bmp.get(0), State::Free);
        assert_eq!(bmp.get(2), State::Used);
        assert!(bmp.test(2));
    }

    #[test]
    fn can_set_values_at_ends_of_bitmap() {
        let mut bmp = Bitmap::new(4096).unwrap();

        bmp.set(0);
        bmp.set(4095);

        assert_eq!(bmp.get(0), State::Used);
        assert_eq!(bmp.get(4095), State::Used);
        assert_eq!(bmp.count_set(), 2);
    }

    #[test]
    fn can_toggle_block_between_free_and_used() {
        let mut bmp = Bitmap::new(64).unwrap();
        bmp.set(9);

        bmp.set(10);
        assert_eq!(bmp.get(10), State::Used);

        bmp.reset(10);
        assert_eq!(bmp.get(10), State::Free);
        // Neighbouring bits are untouched.
        assert_eq!(bmp.get(9), State::Used);
    }

    #[test]
    fn first_clear_finds_lowest_free_bit_across_words() {
        let mut bmp = Bitmap::new(130).unwrap();
        for i in 0..70 {
            bmp.set(i);
        }
        assert_eq!(bmp.first_clear(), Some(70));

        bmp.reset(3);
        assert_eq!(bmp.first_clear(), Some(3));
    }

    #[test]
    fn first_clear_ignores_tail_of_last_word() {
        let mut bmp = Bitmap::new(8).unwrap();
        for i in 0..8 {
            bmp.set(i);
        }
        assert_eq!(bmp.first_clear(), None);
        assert_eq!(bmp.count_set(), 8);
    }

    #[test]
    fn oversized_bitmap_reports_allocation_failure() {
        assert!(Bitmap::new(usize::MAX).is_err());
    }

    #[test]
    #[should_panic]
    fn setting_bit_past_len_panics() {
        let mut bmp = Bitmap::new(8).unwrap();
        bmp.set(8);
    }

    #[test]
    fn can_serialize_and_parse_state() {
        let mut bmp = Bitmap::new(70).unwrap();
        bmp.set(0);
        bmp.set(9);
        bmp.set(69);

        let encoded = bmp.serialize();
        assert_eq!(encoded.len(), 9);
        assert_eq!(encoded[0], 0b0000_0001);
        assert_eq!(encoded[1], 0b0000_0010);
        assert_eq!(encoded[8], 0b0010_0000);

        assert_eq!(Bitmap::parse(70, &encoded).unwrap(), bmp);
    }

    #[test]
    fn parse_drops_bits_past_len() {
        let bmp = Bitmap::parse(4, &[0xFF]).unwrap();
        assert_eq!(bmp.count_set(), 4);
        assert_eq!(bmp.first_clear(), None);
    }
}
