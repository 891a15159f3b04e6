// Read-only ext2 metadata engine.
//
// Decodes superblock, block-group, inode, directory, and block-allocation
// structures straight from the bytes of a device or image file, without
// mounting anything. The device is never written.

pub mod block_map;
pub mod constants;
pub mod detection;
pub mod dir;
pub mod reader;
pub mod search;
pub mod structures;
pub mod types;

pub use detection::{classify, probe, ExtVariant};
pub use reader::Ext2Reader;
pub use types::{
    DirectoryEntry, FileType, InodeInfo, MatchMode, SearchResult, SuperblockInfo,
};

// Re-exported so callers never need a magic number for the root.
pub use constants::EXT2_ROOT_INO;
