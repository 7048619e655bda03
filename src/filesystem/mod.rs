use std::io::{Read, Write};

use log::{debug, info, warn};

use crate::filetypes::helpers::timestamp_now;
use crate::structs::*;
use crate::Error;

mod address;
mod lifecycle;

pub use address::TierAddress;

/// Whole filesystem, held in one contiguous byte blob.
/// The header is cached in [`Partition::header`] and written back into
/// block 0 whenever it changes, so the blob is always ready to be dumped.
#[derive(Debug, Clone)]
pub struct Partition {
    pub(crate) header: Header,
    pub(crate) data: Vec<u8>,
}

impl Partition {
    /// Format a new partition with the default geometry
    pub fn create(size: u32) -> Result<Self, Error> {
        Self::with_geometry(size, Geometry::default())
    }

    /// Format a new partition of `size` bytes
    pub fn with_geometry(size: u32, geometry: Geometry) -> Result<Self, Error> {
        let header = Header::new(size, geometry)?;
        let mut partition = Self {
            header,
            data: vec![0u8; size as usize],
        };
        partition.block_bitmap_mut().clear();
        partition.inode_bitmap_mut().clear();
        for index in 0..partition.header.blocks {
            partition.mark_block(index, true)?;
        }
        partition.mark_inode(ROOT_INODE, true)?;
        let mut root = Inode::new(ROOT_INODE, timestamp_now());
        root.reference_count = 1;
        partition.flush_inode(&root);
        partition.header.root = ROOT_INODE;
        partition.flush_header();
        info!(
            "Created partition of {size} bytes: {} inodes, {} blocks, data from block {}",
            partition.header.inode_count, partition.header.block_count, partition.header.blocks
        );
        Ok(partition)
    }

    /// Adopt a previously serialized partition verbatim
    pub fn load(bytes: &[u8]) -> Result<Self, Error> {
        let header = Header::decode(bytes)?;
        header.validate()?;
        if bytes.len() < header.size as usize {
            return Err(Error::TooSmall);
        }
        debug!("Loaded partition of {} bytes", header.size);
        Ok(Self {
            header,
            data: bytes[..header.size as usize].to_vec(),
        })
    }

    /// Exact copy of the partition blob
    pub fn serialize(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Load partition from a host file or any other byte stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::load(&bytes)
    }

    /// Dump partition to a host file or any other byte stream
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        info!("Dumping partition of {} bytes", self.data.len());
        writer.write_all(&self.data)?;
        writer.flush()?;
        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn block_size(&self) -> u32 {
        self.header.block_size
    }

    pub fn root(&self) -> u32 {
        self.header.root
    }

    pub fn inode_bitmap(&self) -> Bitmap<'_> {
        let (start, end) = self.bitmap_region(self.header.inode_bitmap, self.header.block_bitmap);
        Bitmap::new(&self.data[start..end], self.header.inode_count)
    }

    pub fn block_bitmap(&self) -> Bitmap<'_> {
        let (start, end) = self.bitmap_region(self.header.block_bitmap, self.header.inodes);
        Bitmap::new(&self.data[start..end], self.header.block_count)
    }

    fn inode_bitmap_mut(&mut self) -> BitmapMut<'_> {
        let (start, end) = self.bitmap_region(self.header.inode_bitmap, self.header.block_bitmap);
        BitmapMut::new(&mut self.data[start..end], self.header.inode_count)
    }

    fn block_bitmap_mut(&mut self) -> BitmapMut<'_> {
        let (start, end) = self.bitmap_region(self.header.block_bitmap, self.header.inodes);
        BitmapMut::new(&mut self.data[start..end], self.header.block_count)
    }

    fn bitmap_region(&self, first: u32, next: u32) -> (usize, usize) {
        (
            self.header.block_position(first),
            self.header.block_position(next),
        )
    }

    fn flush_header(&mut self) {
        self.header.encode(&mut self.data);
    }

    /// Mark inode occupancy, keeping the usage counter in step with the bitmap
    fn mark_inode(&mut self, index: u32, used: bool) -> Result<bool, Error> {
        let changed = self.inode_bitmap_mut().set(index, used)?;
        if changed {
            if used {
                self.header.inode_used += 1;
            } else {
                self.header.inode_used -= 1;
            }
            self.flush_header();
        }
        Ok(changed)
    }

    /// Mark block occupancy, keeping the usage counter in step with the bitmap
    fn mark_block(&mut self, index: u32, used: bool) -> Result<bool, Error> {
        let changed = self.block_bitmap_mut().set(index, used)?;
        if changed {
            if used {
                self.header.block_used += 1;
            } else {
                self.header.block_used -= 1;
            }
            self.flush_header();
        }
        Ok(changed)
    }

    /// Get index of first free inode and mark it used
    pub fn acquire_inode(&mut self) -> Result<u32, Error> {
        let Some(index) = self.inode_bitmap().next_free() else {
            warn!("No free inodes left");
            return Err(Error::OutOfInodes);
        };
        debug!("Acquire inode {index}");
        self.mark_inode(index, true)?;
        Ok(index)
    }

    /// Release inode at index. Its blocks must already be released.
    pub fn release_inode(&mut self, index: u32) -> Result<(), Error> {
        if self.mark_inode(index, false)? {
            debug!("Release inode {index}");
        } else {
            warn!("Inode {index} released twice");
        }
        Ok(())
    }

    /// Get index of first free block, mark it used and zero its contents
    pub fn acquire_block(&mut self) -> Result<u32, Error> {
        let Some(index) = self.block_bitmap().next_free() else {
            warn!("No free blocks left");
            return Err(Error::OutOfBlocks);
        };
        debug!("Acquire block {index}");
        self.mark_block(index, true)?;
        self.block_mut(index).fill(0);
        Ok(index)
    }

    /// Release block at index
    pub fn release_block(&mut self, index: u32) -> Result<(), Error> {
        if index < self.header.blocks {
            warn!("Refusing to release metadata block {index}");
            return Err(Error::OutOfBounds);
        }
        if self.mark_block(index, false)? {
            debug!("Release block {index}");
        } else {
            warn!("Block {index} released twice");
        }
        Ok(())
    }

    /// Byte offset of an inode record within the blob
    pub fn inode_position(&self, index: u32) -> usize {
        self.header.inode_position(index)
    }

    /// Load allocated inode with index
    pub fn load_inode(&self, index: u32) -> Result<Inode, Error> {
        if !self.inode_bitmap().get(index)? {
            return Err(Error::OutOfBounds);
        }
        let position = self.inode_position(index);
        Ok(Inode::decode(index, &self.data[position..]))
    }

    /// Store inode record back into the inode table
    pub fn flush_inode(&mut self, inode: &Inode) {
        let position = self.inode_position(inode.index);
        inode.encode(&mut self.data[position..]);
    }

    /// Raw contents of a block
    pub fn block(&self, index: u32) -> &[u8] {
        let start = self.header.block_position(index);
        &self.data[start..start + self.header.block_size as usize]
    }

    pub(crate) fn block_mut(&mut self, index: u32) -> &mut [u8] {
        let start = self.header.block_position(index);
        &mut self.data[start..start + self.header.block_size as usize]
    }

    pub(crate) fn pointer(&self, block: u32, slot: u32) -> u32 {
        read_pointer(self.block(block), slot)
    }

    pub(crate) fn set_pointer(&mut self, block: u32, slot: u32, pointer: u32) {
        write_pointer(self.block_mut(block), slot, pointer)
    }
}
