use super::BlockCursor;

use crate::structs::NULL_BLOCK;

impl BlockCursor {
    pub fn new(block_size: u32) -> Self {
        Self {
            block_size,
            position: 0,
            block_position: block_size,
            current_block: NULL_BLOCK,
        }
    }

    /// Move to `position`, forgetting the resolved block
    pub fn set(&mut self, position: u32) {
        self.position = position;
        self.block_position = self.block_size;
        self.current_block = NULL_BLOCK;
    }

    /// Attach the physical block holding the current position
    pub fn resolve(&mut self, block: u32) {
        self.current_block = block;
        self.block_position = self.position % self.block_size;
    }

    pub fn is_resolved(&self) -> bool {
        self.block_position < self.block_size
    }

    /// Move forward within the current block
    pub fn advance(&mut self, bytes: u32) {
        debug_assert!(bytes <= self.remaining());
        self.position += bytes;
        self.block_position += bytes;
    }

    /// Bytes left in the current block
    pub fn remaining(&self) -> u32 {
        self.block_size - self.block_position
    }

    /// Logical block number of the current position
    pub fn logical_block(&self) -> u64 {
        (self.position / self.block_size) as u64
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn byte(&self) -> usize {
        self.block_position as usize
    }

    pub fn block(&self) -> u32 {
        self.current_block
    }
}
