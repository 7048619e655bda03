use log::{debug, error};

use super::Partition;
use crate::structs::*;
use crate::Error;

/// Position of a logical block within an inode's addressing tree.
/// Offsets are slots in successive index blocks, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierAddress {
    Direct(usize),
    Single(u32),
    Double(u32, u32),
    Triple(u32, u32, u32),
}

impl TierAddress {
    /// Split a logical block number into its tier and per-level offsets
    pub fn decompose(logical: u64, per_block: u32) -> Result<Self, Error> {
        let per_block = per_block as u64;
        let mut rest = logical;
        if rest < DIRECT_BLOCKS as u64 {
            return Ok(Self::Direct(rest as usize));
        }
        rest -= DIRECT_BLOCKS as u64;
        if rest < per_block {
            return Ok(Self::Single(rest as u32));
        }
        rest -= per_block;
        if rest < per_block.pow(2) {
            return Ok(Self::Double(
                (rest / per_block) as u32,
                (rest % per_block) as u32,
            ));
        }
        rest -= per_block.pow(2);
        if rest < per_block.pow(3) {
            return Ok(Self::Triple(
                (rest / per_block.pow(2)) as u32,
                (rest / per_block % per_block) as u32,
                (rest % per_block) as u32,
            ));
        }
        Err(Error::FileTooLarge)
    }

    /// Pointer in the inode where the walk starts
    pub fn root(&self) -> RootPointer {
        match *self {
            Self::Direct(slot) => RootPointer::Direct(slot),
            Self::Single(..) => RootPointer::Indirect,
            Self::Double(..) => RootPointer::DoubleIndirect,
            Self::Triple(..) => RootPointer::TripleIndirect,
        }
    }

    /// Index block slots to follow from the root, and how many of them are used
    pub fn offsets(&self) -> ([u32; 3], usize) {
        match *self {
            Self::Direct(_) => ([0; 3], 0),
            Self::Single(i) => ([i, 0, 0], 1),
            Self::Double(d, i) => ([d, i, 0], 2),
            Self::Triple(t, d, i) => ([t, d, i], 3),
        }
    }
}

impl Partition {
    fn pointers_per_block(&self) -> u32 {
        pointers_per_block(self.header.block_size)
    }

    /// Pass through a pointer read from `owner`'s chain if it can be followed.
    /// Anything outside the data region means the chain is corrupt.
    fn checked_pointer(&self, owner: u32, block: u32) -> Result<u32, Error> {
        if block != NULL_BLOCK && !(self.header.blocks..self.header.block_count).contains(&block) {
            error!("Inode {owner} points at block {block} outside the data region");
            return Err(Error::BrokenChain(owner));
        }
        Ok(block)
    }

    /// Physical block holding `logical` block of the file, if it was ever allocated
    pub fn resolve_for_read(&self, inode: &Inode, logical: u64) -> Result<Option<u32>, Error> {
        let address = TierAddress::decompose(logical, self.pointers_per_block())?;
        let (offsets, depth) = address.offsets();
        let mut current = self.checked_pointer(inode.index, inode.pointer(address.root()))?;
        for &offset in &offsets[..depth] {
            if current == NULL_BLOCK {
                return Ok(None);
            }
            current = self.checked_pointer(inode.index, self.pointer(current, offset))?;
        }
        Ok((current != NULL_BLOCK).then_some(current))
    }

    /// Physical block holding `logical` block of the file, allocating the data block
    /// and any missing index blocks above it. Either every missing block is linked
    /// in, or nothing is: a failed allocation releases whatever this call reserved.
    pub fn resolve_for_write(&mut self, inode: &mut Inode, logical: u64) -> Result<u32, Error> {
        let address = TierAddress::decompose(logical, self.pointers_per_block())?;
        let (offsets, depth) = address.offsets();
        let root = address.root();

        // Follow the existing part of the chain
        let mut holder = NULL_BLOCK;
        let mut current = self.checked_pointer(inode.index, inode.pointer(root))?;
        let mut level = 0;
        while current != NULL_BLOCK && level < depth {
            holder = current;
            current = self.checked_pointer(inode.index, self.pointer(holder, offsets[level]))?;
            level += 1;
        }
        if current != NULL_BLOCK {
            return Ok(current);
        }

        // Reserve the rest, outermost first
        let mut fresh = Vec::with_capacity(depth - level + 1);
        for _ in level..=depth {
            match self.acquire_block() {
                Ok(block) => fresh.push(block),
                Err(e) => {
                    debug!(
                        "Rolling back {} blocks reserved for inode {}",
                        fresh.len(),
                        inode.index
                    );
                    for block in fresh.into_iter().rev() {
                        self.release_block(block)?;
                    }
                    return Err(e);
                }
            }
        }

        // Link them in
        if level == 0 {
            inode.set_pointer(root, fresh[0]);
        } else {
            self.set_pointer(holder, offsets[level - 1], fresh[0]);
        }
        for (step, pair) in fresh.windows(2).enumerate() {
            self.set_pointer(pair[0], offsets[level + step], pair[1]);
        }
        Ok(fresh[fresh.len() - 1])
    }

    /// Release data blocks from logical index `keep` up to the end of the file,
    /// along with every index block left covering nothing. Leaves `inode.size` alone.
    pub(crate) fn release_blocks_from(&mut self, inode: &mut Inode, keep: u64) -> Result<(), Error> {
        let end = inode.data_blocks(self.header.block_size);
        if keep >= end {
            return Ok(());
        }
        for slot in keep as usize..(end as usize).min(DIRECT_BLOCKS) {
            let block = self.checked_pointer(inode.index, inode.direct[slot])?;
            if block == NULL_BLOCK {
                error!("Inode {} lost direct block {slot}", inode.index);
                continue;
            }
            self.release_block(block)?;
            inode.direct[slot] = NULL_BLOCK;
        }
        let per_block = self.pointers_per_block() as u64;
        let mut first = DIRECT_BLOCKS as u64;
        let tiers = [
            RootPointer::Indirect,
            RootPointer::DoubleIndirect,
            RootPointer::TripleIndirect,
        ];
        for (depth, root) in (1..).zip(tiers) {
            let span = per_block.pow(depth);
            if first >= end {
                break;
            }
            if first + span > keep {
                let range = Range {
                    owner: inode.index,
                    first,
                    keep,
                    end,
                };
                self.release_tree(inode.pointer(root), depth, range, per_block)?;
                if first >= keep {
                    inode.set_pointer(root, NULL_BLOCK);
                }
            }
            first += span;
        }
        Ok(())
    }

    /// Release the part of a subtree covering logical blocks `[keep, end)`.
    /// Leaves go before the index block holding them.
    fn release_tree(
        &mut self,
        block: u32,
        depth: u32,
        range: Range,
        per_block: u64,
    ) -> Result<(), Error> {
        if self.checked_pointer(range.owner, block)? == NULL_BLOCK {
            error!("Missing block at depth {depth} covering logical block {}", range.first);
            return Ok(());
        }
        if depth > 0 {
            let span = per_block.pow(depth - 1);
            for slot in 0..per_block {
                let first = range.first + slot * span;
                if first >= range.end {
                    break;
                }
                if first + span <= range.keep {
                    continue;
                }
                let child = self.pointer(block, slot as u32);
                let child_range = Range { first, ..range };
                self.release_tree(child, depth - 1, child_range, per_block)?;
                if first >= range.keep {
                    self.set_pointer(block, slot as u32, NULL_BLOCK);
                }
            }
        }
        if range.first >= range.keep {
            self.release_block(block)?;
        }
        Ok(())
    }
}

/// Logical blocks covered by a subtree starting at `first`, of which `[keep, end)` go
#[derive(Debug, Clone, Copy)]
struct Range {
    owner: u32,
    first: u64,
    keep: u64,
    end: u64,
}
