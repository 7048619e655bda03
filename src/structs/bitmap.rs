use std::fmt::Display;
use std::mem::size_of;

use super::*;
use crate::Error;

const BITS_IN_BYTE: u64 = 8;
const BYTES_IN_WORD: usize = size_of::<u64>();
const BITS_IN_WORD: u64 = BYTES_IN_WORD as u64 * BITS_IN_BYTE;

impl<'a> Bitmap<'a> {
    pub fn new(bitfield: &'a [u8], count: u32) -> Self {
        debug_assert!(bitfield.len() as u64 * BITS_IN_BYTE >= count as u64);
        Self { bitfield, count }
    }

    /// Number of valid indexes
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Get index of first unoccupied entity, if any
    pub fn next_free(&self) -> Option<u32> {
        let words = (self.count as u64).div_ceil(BITS_IN_WORD) as usize;
        for (row, chunk) in self.bitfield.chunks(BYTES_IN_WORD).take(words).enumerate() {
            // Bytes missing past the region's end count as occupied
            let mut raw = [u8::MAX; BYTES_IN_WORD];
            raw[..chunk.len()].copy_from_slice(chunk);
            let word = u64::from_be_bytes(raw);
            if word == u64::MAX {
                continue;
            }
            let index = row as u64 * BITS_IN_WORD + word.leading_ones() as u64;
            // Only the last word can carry slack past count
            return (index < self.count as u64).then_some(index as u32);
        }
        None
    }

    /// Get occupancy
    pub fn get(&self, index: u32) -> Result<bool, Error> {
        if index >= self.count {
            return Err(Error::OutOfBounds);
        }
        let (row, mask) = position(index);
        Ok(self.bitfield[row] & mask != 0)
    }

    /// Count occupied indexes
    pub fn count_used(&self) -> u32 {
        let full = (self.count / BITS_IN_BYTE as u32) as usize;
        let mut used: u32 = self.bitfield[..full].iter().map(|b| b.count_ones()).sum();
        let rest = self.count % BITS_IN_BYTE as u32;
        if rest != 0 {
            let mask = !(u8::MAX >> rest);
            used += (self.bitfield[full] & mask).count_ones();
        }
        used
    }
}

impl<'a> BitmapMut<'a> {
    pub fn new(bitfield: &'a mut [u8], count: u32) -> Self {
        debug_assert!(bitfield.len() as u64 * BITS_IN_BYTE >= count as u64);
        Self { bitfield, count }
    }

    pub fn as_ref(&self) -> Bitmap<'_> {
        Bitmap::new(self.bitfield, self.count)
    }

    /// Modify occupancy, returning whether the bit actually flipped
    pub fn set(&mut self, index: u32, value: bool) -> Result<bool, Error> {
        if index >= self.count {
            return Err(Error::OutOfBounds);
        }
        let (row, mask) = position(index);
        let previous = self.bitfield[row] & mask != 0;
        if value {
            self.bitfield[row] |= mask;
        } else {
            self.bitfield[row] &= !mask;
        }
        Ok(previous != value)
    }

    /// Clear every bit in the region, slack included
    pub fn clear(&mut self) {
        self.bitfield.fill(0);
    }
}

fn position(index: u32) -> (usize, u8) {
    let row = index as u64 / BITS_IN_BYTE;
    let col = index as u64 % BITS_IN_BYTE;
    (row as usize, 0x80u8 >> col)
}

impl Display for Bitmap<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} of {} used", self.count_used(), self.count)?;
        for index in 0..self.count {
            let bit = self.get(index).map_err(|_| std::fmt::Error)?;
            write!(f, "{}", if bit { '1' } else { '0' })?;
            if index % BITS_IN_WORD as u32 == BITS_IN_WORD as u32 - 1 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
