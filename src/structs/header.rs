use std::fmt::Display;
use std::mem::size_of;

use super::*;
use crate::Error;

pub const HEADER_SIZE: usize = size_of::<Header>();
const BITS_IN_BYTE: u32 = 8;

impl Default for Geometry {
    fn default() -> Self {
        Self {
            inode_size: DEFAULT_INODE_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl Geometry {
    pub fn new(inode_size: u32, block_size: u32) -> Result<Self, Error> {
        let geometry = Self {
            inode_size,
            block_size,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        let block_size_ok = self.block_size.is_power_of_two()
            && (MINIMUM_BLOCK_SIZE..=MAXIMUM_BLOCK_SIZE).contains(&self.block_size);
        // A slot never exceeds one block
        let inode_size_ok =
            (INODE_RECORD_SIZE as u32..=self.block_size).contains(&self.inode_size);
        if block_size_ok && inode_size_ok {
            Ok(())
        } else {
            Err(Error::InvalidGeometry)
        }
    }

    /// Smallest partition this geometry can be formatted into
    pub fn minimum_size(&self) -> u32 {
        MINIMUM_BLOCKS * self.block_size
    }
}

impl Header {
    /// Lay out a fresh partition of `size` bytes. Counters start at zero.
    pub fn new(size: u32, geometry: Geometry) -> Result<Self, Error> {
        geometry.validate()?;
        if size < geometry.minimum_size() {
            return Err(Error::TooSmall);
        }
        let Geometry {
            inode_size,
            block_size,
        } = geometry;
        let block_count = size / block_size;
        let bitmap_bytes = block_count.div_ceil(BITS_IN_BYTE);
        let bitmap_blocks = bitmap_bytes.div_ceil(block_size);
        let inode_bitmap = 1;
        let block_bitmap = inode_bitmap + bitmap_blocks;
        let inodes = block_bitmap + bitmap_blocks;
        let remaining = (block_count - inodes) as u64;
        // Root directory always needs a slot, even when the split rounds to zero
        let inode_count =
            (remaining * inode_size as u64 / (inode_size + block_size) as u64).max(1) as u32;
        let table_bytes = inode_count as u64 * inode_size as u64;
        let blocks = inodes + table_bytes.div_ceil(block_size as u64) as u32;
        if blocks >= block_count {
            return Err(Error::TooSmall);
        }
        Ok(Self {
            size,
            inode_size,
            block_size,
            inode_bitmap,
            block_bitmap,
            inodes,
            blocks,
            inode_count,
            block_count,
            inode_used: 0,
            block_used: 0,
            root: ROOT_INODE,
        })
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            inode_size: self.inode_size,
            block_size: self.block_size,
        }
    }

    /// Decode header from the first [`HEADER_SIZE`] bytes of a blob
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::TooSmall);
        }
        let raw: Header = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
        Ok(raw.map_fields(u32::from_le))
    }

    /// Encode header into the first [`HEADER_SIZE`] bytes of a blob
    pub fn encode(&self, bytes: &mut [u8]) {
        let raw = self.map_fields(u32::to_le);
        bytes[..HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&raw));
    }

    /// Check that a decoded header describes a layout that can be addressed safely
    pub(crate) fn validate(&self) -> Result<(), Error> {
        self.geometry().validate()?;
        if self.size < self.geometry().minimum_size() {
            return Err(Error::TooSmall);
        }
        let ordered = 0 < self.inode_bitmap
            && self.inode_bitmap < self.block_bitmap
            && self.block_bitmap < self.inodes
            && self.inodes < self.blocks
            && self.blocks < self.block_count;
        if !ordered {
            return Err(Error::InvalidGeometry);
        }
        let region_bits = |start: u32, end: u32| {
            (end - start) as u64 * self.block_size as u64 * BITS_IN_BYTE as u64
        };
        let table_end = self.inode_position(self.inode_count) as u64;
        let fits = self.block_count as u64 * self.block_size as u64 <= self.size as u64
            && table_end <= self.block_position(self.blocks) as u64
            && region_bits(self.inode_bitmap, self.block_bitmap) >= self.inode_count as u64
            && region_bits(self.block_bitmap, self.inodes) >= self.block_count as u64
            && self.root < self.inode_count;
        if fits {
            Ok(())
        } else {
            Err(Error::InvalidGeometry)
        }
    }

    /// Byte offset of a block within the blob
    pub fn block_position(&self, index: u32) -> usize {
        index as usize * self.block_size as usize
    }

    /// Byte offset of an inode record within the blob
    pub fn inode_position(&self, index: u32) -> usize {
        self.block_position(self.inodes) + index as usize * self.inode_size as usize
    }

    fn map_fields(self, f: fn(u32) -> u32) -> Self {
        Self {
            size: f(self.size),
            inode_size: f(self.inode_size),
            block_size: f(self.block_size),
            inode_bitmap: f(self.inode_bitmap),
            block_bitmap: f(self.block_bitmap),
            inodes: f(self.inodes),
            blocks: f(self.blocks),
            inode_count: f(self.inode_count),
            block_count: f(self.block_count),
            inode_used: f(self.inode_used),
            block_used: f(self.block_used),
            root: f(self.root),
        }
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "size:         {}", self.size)?;
        writeln!(f, "inode size:   {}", self.inode_size)?;
        writeln!(f, "block size:   {}", self.block_size)?;
        writeln!(f, "inode bitmap: {}", self.inode_bitmap)?;
        writeln!(f, "block bitmap: {}", self.block_bitmap)?;
        writeln!(f, "inode table:  {}", self.inodes)?;
        writeln!(f, "data blocks:  {}", self.blocks)?;
        writeln!(f, "inodes:       {}/{}", self.inode_used, self.inode_count)?;
        writeln!(f, "blocks:       {}/{}", self.block_used, self.block_count)?;
        write!(f, "root:         {}", self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_block_layout() {
        let header = Header::new(5 * 1024, Geometry::default()).unwrap();
        assert_eq!(header.block_count, 5);
        assert_eq!(header.inode_bitmap, 1);
        assert_eq!(header.block_bitmap, 2);
        assert_eq!(header.inodes, 3);
        assert_eq!(header.inode_count, 1);
        assert_eq!(header.blocks, 4);
    }

    #[test]
    fn inode_table_proportional_to_data() {
        let header = Header::new(1024 * 1024, Geometry::default()).unwrap();
        assert_eq!(header.block_count, 1024);
        assert_eq!(header.inodes, 3);
        // (1024 - 3) * 128 / (128 + 1024)
        assert_eq!(header.inode_count, 113);
        // 113 * 128 bytes span 15 blocks, rounded up
        assert_eq!(header.blocks, 3 + 15);
        assert!(header.validate().is_ok());
    }

    #[test]
    fn multi_block_bitmaps() {
        let geometry = Geometry::new(128, 128).unwrap();
        let header = Header::new(2048 * 128, geometry).unwrap();
        // 2048 bits take 256 bytes, two blocks per bitmap
        assert_eq!(header.block_bitmap, 3);
        assert_eq!(header.inodes, 5);
        // (2048 - 5) * 128 / 256
        assert_eq!(header.inode_count, 1021);
        assert_eq!(header.blocks, 5 + 1021);
        assert!(header.validate().is_ok());
    }

    #[test]
    fn too_small() {
        assert!(matches!(
            Header::new(5 * 1024 - 1, Geometry::default()),
            Err(Error::TooSmall)
        ));
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(Geometry::new(128, 1000).is_err());
        assert!(Geometry::new(128, 64).is_err());
        assert!(Geometry::new(16, 1024).is_err());
        assert!(Geometry::new(2048, 1024).is_err());
        assert!(Geometry::new(80, 128).is_ok());
    }

    #[test]
    fn encoding_is_little_endian() {
        let header = Header::new(5 * 1024, Geometry::default()).unwrap();
        let mut bytes = vec![0u8; 64];
        header.encode(&mut bytes);
        assert_eq!(&bytes[0..4], &(5u32 * 1024).to_le_bytes());
        assert_eq!(&bytes[4..8], &128u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1024u32.to_le_bytes());
        assert_eq!(Header::decode(&bytes).unwrap(), header);
    }
}
