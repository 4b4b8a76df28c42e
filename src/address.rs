/// Number of lines in each processor cache.
pub const CACHE_LINES: usize = 512;

const INDEX_MASK: u64 = 0x1FF;
const OFFSET_BITS: u32 = 2;
const TAG_SHIFT: u32 = 11;

/// Split an address into its cache index and tag. The two byte-offset bits
/// are dropped.
pub fn decode(address: u64) -> (usize, u64) {
    let index = ((address >> OFFSET_BITS) & INDEX_MASK) as usize;
    let tag = address >> TAG_SHIFT;
    (index, tag)
}

/// Rebuild the word-aligned address of a block.
pub fn encode(index: usize, tag: u64) -> u64 {
    (tag << TAG_SHIFT) | (((index as u64) & INDEX_MASK) << OFFSET_BITS)
}
