use log::{debug, info};

use super::Partition;
use crate::filetypes::helpers::timestamp_now;
use crate::structs::Inode;
use crate::Error;

impl Partition {
    /// Allocate a fresh, unlinked inode
    pub fn touch(&mut self) -> Result<u32, Error> {
        let index = self.acquire_inode()?;
        self.flush_inode(&Inode::new(index, timestamp_now()));
        debug!("Touched inode {index}");
        Ok(index)
    }

    /// Shrink file to `size` bytes, releasing blocks past the new end.
    /// Sizes at or beyond the current one leave the file untouched.
    pub fn truncate(&mut self, index: u32, size: u32) -> Result<(), Error> {
        let mut inode = self.load_inode(index)?;
        if size >= inode.size {
            return Ok(());
        }
        let keep = (size as u64).div_ceil(self.header.block_size as u64);
        self.release_blocks_from(&mut inode, keep)?;
        inode.size = size;
        inode.mtime = timestamp_now();
        self.flush_inode(&inode);
        debug!("Truncated inode {index} to {size} bytes");
        Ok(())
    }

    /// Release every block of the file, keeping the inode itself
    pub fn erase(&mut self, index: u32) -> Result<(), Error> {
        self.truncate(index, 0)
    }

    /// Erase the file and release its inode
    pub fn delete(&mut self, index: u32) -> Result<(), Error> {
        if self.load_inode(index)?.reference_count > 0 {
            return Err(Error::StillLinked);
        }
        self.erase(index)?;
        self.release_inode(index)?;
        info!("Deleted inode {index}");
        Ok(())
    }
}
