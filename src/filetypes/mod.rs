mod block_cursor;
mod directory;
mod directory_entry;
mod file_stream;
pub(crate) mod helpers;

use crate::filesystem::Partition;
use crate::structs::Inode;

pub use directory::LINE_BUFFER_SIZE;

/// Read/write position over one inode's contents.
/// Writes land in the partition immediately; there is nothing to flush on close.
#[derive(Debug)]
pub struct FileStream<'a> {
    pub(crate) partition: &'a mut Partition,
    pub(crate) inode: Inode,
    pub(crate) cursor: BlockCursor,
}

/// Byte position within a file, paired with the physical block it falls into
#[derive(Debug, Clone)]
pub struct BlockCursor {
    pub(crate) block_size: u32,
    /// Logical byte position in the file
    pub(crate) position: u32,
    /// Offset within [`current_block`](Self::current_block).
    /// Equal to `block_size` while no block is resolved.
    pub(crate) block_position: u32,
    pub(crate) current_block: u32,
}

/// Kind of file a directory entry points to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    RegularFile,
    Directory,
    /// Tag written by someone else, preserved as is
    Other(u32),
}

/// One record of a directory's contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub inode: u32,
    pub kind: EntryKind,
    pub name: String,
}
