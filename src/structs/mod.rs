mod bitmap;
mod block;
mod header;
mod inode;

pub use block::*;
pub use header::*;
pub use inode::*;

pub const DEFAULT_INODE_SIZE: u32 = 128;
pub const DEFAULT_BLOCK_SIZE: u32 = 1024;
pub const MINIMUM_BLOCK_SIZE: u32 = 128;
pub const MAXIMUM_BLOCK_SIZE: u32 = 65536;
pub const MINIMUM_BLOCKS: u32 = 5;
pub const DIRECT_BLOCKS: usize = 12;
pub const POINTER_SIZE: u32 = 4;
pub const NULL_BLOCK: u32 = 0;
pub const ROOT_INODE: u32 = 0;

/// Sizes fixed for the lifetime of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Size of one inode table slot in bytes
    pub inode_size: u32,
    /// Block size in bytes
    pub block_size: u32,
}

/// Partition header, stored at the very beginning of block 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Header {
    /// Total partition size in bytes
    pub size: u32,
    /// Size of one inode table slot in bytes
    pub inode_size: u32,
    /// Block size in bytes
    pub block_size: u32,
    /// First block of the inode bitmap
    pub inode_bitmap: u32,
    /// First block of the block bitmap
    pub block_bitmap: u32,
    /// First block of the inode table
    pub inodes: u32,
    /// First block of the data region
    pub blocks: u32,
    /// Total count of inodes
    pub inode_count: u32,
    /// Total count of blocks, metadata included
    pub block_count: u32,
    /// Count of allocated inodes
    pub inode_used: u32,
    /// Count of allocated blocks
    pub block_used: u32,
    /// Root directory inode
    pub root: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inode {
    /// Inode's index, not stored in the record itself
    pub index: u32,
    /// Hard link count
    pub reference_count: u32,
    /// File size in bytes
    pub size: u32,
    /// Last data modification timestamp in seconds
    pub mtime: u64,
    /// Blocks holding the first [`DIRECT_BLOCKS`] blocks of data
    pub direct: [u32; DIRECT_BLOCKS],
    /// Index block of data block pointers
    pub indirect: u32,
    /// Index block of single indirect index blocks
    pub double_indirect: u32,
    /// Index block of double indirect index blocks
    pub triple_indirect: u32,
}

/// Bit-per-entity occupancy map over a region of the partition.
/// Bit 0 is the most significant bit of the region's first byte.
#[derive(Debug)]
pub struct Bitmap<'a> {
    /// Raw bitmap region
    pub(crate) bitfield: &'a [u8],
    /// Number of valid indexes
    pub(crate) count: u32,
}

/// Mutable counterpart of [`Bitmap`]
#[derive(Debug)]
pub struct BitmapMut<'a> {
    pub(crate) bitfield: &'a mut [u8],
    pub(crate) count: u32,
}
