// Block map resolution: direct pointers plus single/double/triple indirect
// expansion, in logical order.

use crate::constants::*;
use crate::structures::Ext2Inode;
use byteorder::{ByteOrder, LittleEndian};
use log::trace;
use scry_core::{BlockDevice, ScryError};

/// Resolves an inode's block pointers into the ordered list of data block
/// numbers it owns. A `0` entry marks a hole inside a sparse file; the map
/// ends where the file's logical extent ends.
pub struct BlockMapResolver<'a> {
    device: &'a BlockDevice,
    block_size: u32,
    total_blocks: u64,
}

impl<'a> BlockMapResolver<'a> {
    pub fn new(device: &'a BlockDevice, block_size: u32, total_blocks: u64) -> Self {
        BlockMapResolver {
            device,
            block_size,
            total_blocks,
        }
    }

    /// Walk the inode's pointer tiers and return its block map.
    ///
    /// The logical extent is `ceil(size / block_size)`; pointers beyond it
    /// are end-of-allocation and never read, while a zero pointer inside it
    /// is a hole and contributes a `0` sentinel. An extent larger than the
    /// filesystem itself, or any pointer referencing a block past the end,
    /// is corruption.
    pub fn resolve(&self, inode: &Ext2Inode) -> Result<Vec<u64>, ScryError> {
        let block_size = self.block_size as u64;
        let size = inode.size();
        let logical_extent = size.div_ceil(block_size);

        if logical_extent > self.total_blocks {
            return Err(ScryError::CorruptFilesystem(format!(
                "inode size {} implies {} blocks, filesystem has {}",
                size, logical_extent, self.total_blocks
            )));
        }
        let total = logical_extent as usize;

        let mut map = Vec::with_capacity(total);

        for i in 0..EXT2_NDIR_BLOCKS {
            if map.len() >= total {
                break;
            }
            let block = inode.i_block[i];
            self.check_pointer(block)?;
            map.push(block as u64);
        }

        // ext2 defines exactly four tiers; walking them as an explicit loop
        // keeps the expansion depth a constant of the format.
        for (slot, level) in [
            (EXT2_IND_BLOCK, 1u32),
            (EXT2_DIND_BLOCK, 2),
            (EXT2_TIND_BLOCK, 3),
        ] {
            if map.len() >= total {
                break;
            }
            self.expand_tier(inode.i_block[slot], level, total, &mut map)?;
        }

        if map.len() < total {
            return Err(ScryError::CorruptFilesystem(format!(
                "inode size {} implies {} blocks but pointer tiers address only {}",
                size,
                total,
                map.len()
            )));
        }

        trace!("resolved {} blocks for inode map", map.len());
        Ok(map)
    }

    /// Expand one pointer subtree. `level` counts the remaining indirection
    /// layers (1 = the pointer references a block of data pointers); it is
    /// at most 3, so the recursion depth is fixed by the tier structure.
    fn expand_tier(
        &self,
        pointer: u32,
        level: u32,
        total: usize,
        map: &mut Vec<u64>,
    ) -> Result<(), ScryError> {
        if map.len() >= total {
            return Ok(());
        }

        if level == 0 {
            self.check_pointer(pointer)?;
            map.push(pointer as u64);
            return Ok(());
        }

        if pointer == 0 {
            // The whole subtree is a hole: its span inside the logical
            // extent becomes sentinel entries.
            let span = self
                .pointers_per_block()
                .pow(level)
                .min((total - map.len()) as u64) as usize;
            map.extend(std::iter::repeat(0u64).take(span));
            return Ok(());
        }

        self.check_pointer(pointer)?;
        let pointers = self.read_pointer_block(pointer)?;
        for p in pointers {
            if map.len() >= total {
                break;
            }
            self.expand_tier(p, level - 1, total, map)?;
        }
        Ok(())
    }

    fn pointers_per_block(&self) -> u64 {
        (self.block_size / 4) as u64
    }

    /// Read an indirect block as an array of little-endian pointers.
    fn read_pointer_block(&self, block: u32) -> Result<Vec<u32>, ScryError> {
        let data = self
            .device
            .read_block(block as u64, self.block_size)
            .map_err(|e| match e {
                ScryError::OutOfRange(msg) => ScryError::CorruptFilesystem(msg),
                other => other,
            })?;
        let mut pointers = vec![0u32; self.pointers_per_block() as usize];
        LittleEndian::read_u32_into(&data, &mut pointers);
        Ok(pointers)
    }

    /// A pointer must stay inside the filesystem; zero is allowed (hole or
    /// end-of-allocation, decided by the caller's position).
    fn check_pointer(&self, block: u32) -> Result<(), ScryError> {
        if block as u64 >= self.total_blocks {
            return Err(ScryError::CorruptFilesystem(format!(
                "block pointer {} beyond filesystem end ({} blocks)",
                block, self.total_blocks
            )));
        }
        Ok(())
    }
}
