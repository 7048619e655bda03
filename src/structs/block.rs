use super::POINTER_SIZE;

const BYTES_IN_POINTER: usize = POINTER_SIZE as usize;

/// Number of block pointers held by one index block
pub fn pointers_per_block(block_size: u32) -> u32 {
    block_size / POINTER_SIZE
}

/// Read pointer stored at `slot` of an index block
pub fn read_pointer(block: &[u8], slot: u32) -> u32 {
    let start = slot as usize * BYTES_IN_POINTER;
    let mut raw = [0; BYTES_IN_POINTER];
    raw.copy_from_slice(&block[start..start + BYTES_IN_POINTER]);
    u32::from_le_bytes(raw)
}

/// Store pointer at `slot` of an index block
pub fn write_pointer(block: &mut [u8], slot: u32, pointer: u32) {
    let start = slot as usize * BYTES_IN_POINTER;
    block[start..start + BYTES_IN_POINTER].copy_from_slice(&pointer.to_le_bytes());
}
