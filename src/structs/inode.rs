use std::fmt::Display;
use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

use super::*;

/// Encoded inode record, stored at the start of every inode table slot
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct RawInode {
    reference_count: u32,
    size: u32,
    mtime: u64,
    direct: [u32; DIRECT_BLOCKS],
    indirect: u32,
    double_indirect: u32,
    triple_indirect: u32,
    reserved: u32,
}

pub const INODE_RECORD_SIZE: usize = size_of::<RawInode>();

/// Pointer held directly by the inode, at the root of one addressing tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootPointer {
    Direct(usize),
    Indirect,
    DoubleIndirect,
    TripleIndirect,
}

impl Inode {
    pub fn new(index: u32, mtime: u64) -> Self {
        Self {
            index,
            mtime,
            ..Default::default()
        }
    }

    pub fn decode(index: u32, bytes: &[u8]) -> Self {
        let raw: RawInode = bytemuck::pod_read_unaligned(&bytes[..INODE_RECORD_SIZE]);
        Self {
            index,
            reference_count: u32::from_le(raw.reference_count),
            size: u32::from_le(raw.size),
            mtime: u64::from_le(raw.mtime),
            direct: raw.direct.map(u32::from_le),
            indirect: u32::from_le(raw.indirect),
            double_indirect: u32::from_le(raw.double_indirect),
            triple_indirect: u32::from_le(raw.triple_indirect),
        }
    }

    pub fn encode(&self, bytes: &mut [u8]) {
        let raw = RawInode {
            reference_count: self.reference_count.to_le(),
            size: self.size.to_le(),
            mtime: self.mtime.to_le(),
            direct: self.direct.map(u32::to_le),
            indirect: self.indirect.to_le(),
            double_indirect: self.double_indirect.to_le(),
            triple_indirect: self.triple_indirect.to_le(),
            reserved: 0,
        };
        bytes[..INODE_RECORD_SIZE].copy_from_slice(bytemuck::bytes_of(&raw));
    }

    pub fn pointer(&self, root: RootPointer) -> u32 {
        match root {
            RootPointer::Direct(slot) => self.direct[slot],
            RootPointer::Indirect => self.indirect,
            RootPointer::DoubleIndirect => self.double_indirect,
            RootPointer::TripleIndirect => self.triple_indirect,
        }
    }

    pub fn set_pointer(&mut self, root: RootPointer, pointer: u32) {
        match root {
            RootPointer::Direct(slot) => self.direct[slot] = pointer,
            RootPointer::Indirect => self.indirect = pointer,
            RootPointer::DoubleIndirect => self.double_indirect = pointer,
            RootPointer::TripleIndirect => self.triple_indirect = pointer,
        }
    }

    /// Count of data blocks covering the file's contents
    pub fn data_blocks(&self, block_size: u32) -> u64 {
        (self.size as u64).div_ceil(block_size as u64)
    }
}

impl Display for Inode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "inode:           {}", self.index)?;
        writeln!(f, "references:      {}", self.reference_count)?;
        writeln!(f, "size:            {}", self.size)?;
        writeln!(f, "mtime:           {}", self.mtime)?;
        writeln!(f, "direct:          {:?}", self.direct)?;
        writeln!(f, "indirect:        {}", self.indirect)?;
        writeln!(f, "double indirect: {}", self.double_indirect)?;
        write!(f, "triple indirect: {}", self.triple_indirect)
    }
}
