// ext2 on-disk constants.

// Magic number
pub const EXT2_SUPER_MAGIC: u16 = 0xEF53;

// Superblock location: always 1024 bytes at byte offset 1024,
// regardless of block size.
pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;

// Block sizes
pub const EXT2_MIN_BLOCK_SIZE: u32 = 1024;
pub const EXT2_MAX_BLOCK_LOG_SIZE: u32 = 6; // 1024 << 6 = 64 KiB

// Group descriptor size (ext2 has no 64-bit descriptors)
pub const GROUP_DESC_SIZE: usize = 32;

// Inode sizes
pub const EXT2_GOOD_OLD_INODE_SIZE: u16 = 128;

// Special inode numbers
pub const EXT2_BAD_INO: u32 = 1; // Bad blocks inode
pub const EXT2_ROOT_INO: u32 = 2; // Root directory inode
pub const EXT2_GOOD_OLD_FIRST_INO: u32 = 11; // First non-reserved inode (rev 0)

// Block pointer slots in an inode
pub const EXT2_NDIR_BLOCKS: usize = 12; // Direct pointers
pub const EXT2_IND_BLOCK: usize = 12; // Single indirect
pub const EXT2_DIND_BLOCK: usize = 13; // Double indirect
pub const EXT2_TIND_BLOCK: usize = 14; // Triple indirect
pub const EXT2_N_BLOCKS: usize = 15;

// Directory entries
pub const EXT2_NAME_LEN: usize = 255;
pub const DIRENT_HEADER_LEN: usize = 8;

// Revision levels
pub const EXT2_GOOD_OLD_REV: u32 = 0;
pub const EXT2_DYNAMIC_REV: u32 = 1;

// Feature flags - Compatible (safe to ignore when reading)
pub const EXT2_FEATURE_COMPAT_DIR_PREALLOC: u32 = 0x0001;
pub const EXT2_FEATURE_COMPAT_IMAGIC_INODES: u32 = 0x0002;
pub const EXT3_FEATURE_COMPAT_HAS_JOURNAL: u32 = 0x0004;
pub const EXT2_FEATURE_COMPAT_EXT_ATTR: u32 = 0x0008;
pub const EXT2_FEATURE_COMPAT_RESIZE_INODE: u32 = 0x0010;
pub const EXT2_FEATURE_COMPAT_DIR_INDEX: u32 = 0x0020;

// Feature flags - Incompatible (must be understood to read at all)
pub const EXT2_FEATURE_INCOMPAT_COMPRESSION: u32 = 0x0001;
pub const EXT2_FEATURE_INCOMPAT_FILETYPE: u32 = 0x0002;
pub const EXT3_FEATURE_INCOMPAT_RECOVER: u32 = 0x0004;
pub const EXT3_FEATURE_INCOMPAT_JOURNAL_DEV: u32 = 0x0008;
pub const EXT2_FEATURE_INCOMPAT_META_BG: u32 = 0x0010;
pub const EXT4_FEATURE_INCOMPAT_EXTENTS: u32 = 0x0040;
pub const EXT4_FEATURE_INCOMPAT_64BIT: u32 = 0x0080;

// Feature flags - Read-only compatible
pub const EXT2_FEATURE_RO_COMPAT_SPARSE_SUPER: u32 = 0x0001;
pub const EXT2_FEATURE_RO_COMPAT_LARGE_FILE: u32 = 0x0002;
pub const EXT2_FEATURE_RO_COMPAT_BTREE_DIR: u32 = 0x0004;
pub const EXT4_FEATURE_RO_COMPAT_METADATA_CSUM: u32 = 0x0400;

// The one incompat feature this engine understands. Everything else in the
// incompat bitmap makes the image undecodable as ext2.
pub const SUPPORTED_INCOMPAT_FEATURES: u32 = EXT2_FEATURE_INCOMPAT_FILETYPE;

// File types for directory entries
pub const EXT2_FT_UNKNOWN: u8 = 0;
pub const EXT2_FT_REG_FILE: u8 = 1;
pub const EXT2_FT_DIR: u8 = 2;
pub const EXT2_FT_CHRDEV: u8 = 3;
pub const EXT2_FT_BLKDEV: u8 = 4;
pub const EXT2_FT_FIFO: u8 = 5;
pub const EXT2_FT_SOCK: u8 = 6;
pub const EXT2_FT_SYMLINK: u8 = 7;

// Inode mode bits
pub const S_IFMT: u16 = 0xF000; // Format mask
pub const S_IFSOCK: u16 = 0xC000; // Socket
pub const S_IFLNK: u16 = 0xA000; // Symbolic link
pub const S_IFREG: u16 = 0x8000; // Regular file
pub const S_IFBLK: u16 = 0x6000; // Block device
pub const S_IFDIR: u16 = 0x4000; // Directory
pub const S_IFCHR: u16 = 0x2000; // Character device
pub const S_IFIFO: u16 = 0x1000; // FIFO
