// ext2 on-disk structures.
// CRITICAL: these layouts must match the ext2 specification exactly; every
// struct carries a compile-time size assertion.

use crate::constants::*;
use scry_core::ScryError;
use static_assertions::assert_eq_size;

/// ext2 superblock (1024 bytes), located at byte offset 1024 from the
/// beginning of the device.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Ext2Superblock {
    /* 0x000 */ pub s_inodes_count: u32,        // Total inodes count
    /* 0x004 */ pub s_blocks_count: u32,        // Total blocks count
    /* 0x008 */ pub s_r_blocks_count: u32,      // Reserved blocks count
    /* 0x00C */ pub s_free_blocks_count: u32,   // Free blocks count
    /* 0x010 */ pub s_free_inodes_count: u32,   // Free inodes count
    /* 0x014 */ pub s_first_data_block: u32,    // First data block
    /* 0x018 */ pub s_log_block_size: u32,      // Block size = 1024 << s_log_block_size
    /* 0x01C */ pub s_log_frag_size: u32,       // Fragment size
    /* 0x020 */ pub s_blocks_per_group: u32,    // Blocks per group
    /* 0x024 */ pub s_frags_per_group: u32,     // Fragments per group
    /* 0x028 */ pub s_inodes_per_group: u32,    // Inodes per group
    /* 0x02C */ pub s_mtime: u32,               // Mount time
    /* 0x030 */ pub s_wtime: u32,               // Write time
    /* 0x034 */ pub s_mnt_count: u16,           // Mount count
    /* 0x036 */ pub s_max_mnt_count: u16,       // Max mount count
    /* 0x038 */ pub s_magic: u16,               // Magic (0xEF53)
    /* 0x03A */ pub s_state: u16,               // Filesystem state
    /* 0x03C */ pub s_errors: u16,              // Error handling behavior
    /* 0x03E */ pub s_minor_rev_level: u16,     // Minor revision
    /* 0x040 */ pub s_lastcheck: u32,           // Last check time
    /* 0x044 */ pub s_checkinterval: u32,       // Check interval
    /* 0x048 */ pub s_creator_os: u32,          // Creator OS
    /* 0x04C */ pub s_rev_level: u32,           // Revision level
    /* 0x050 */ pub s_def_resuid: u16,          // Default UID for reserved blocks
    /* 0x052 */ pub s_def_resgid: u16,          // Default GID for reserved blocks

    // -- Dynamic revision fields (only valid if s_rev_level > 0) --
    /* 0x054 */ pub s_first_ino: u32,           // First non-reserved inode
    /* 0x058 */ pub s_inode_size: u16,          // Inode size
    /* 0x05A */ pub s_block_group_nr: u16,      // Group number of this superblock copy
    /* 0x05C */ pub s_feature_compat: u32,      // Compatible features
    /* 0x060 */ pub s_feature_incompat: u32,    // Incompatible features
    /* 0x064 */ pub s_feature_ro_compat: u32,   // Read-only compatible features
    /* 0x068 */ pub s_uuid: [u8; 16],           // Filesystem UUID
    /* 0x078 */ pub s_volume_name: [u8; 16],    // Volume label
    /* 0x088 */ pub s_last_mounted: [u8; 64],   // Last mount path
    /* 0x0C8 */ pub s_algo_bitmap: u32,         // Compression algorithms used

    // -- Performance hints --
    /* 0x0CC */ pub s_prealloc_blocks: u8,      // Blocks to preallocate
    /* 0x0CD */ pub s_prealloc_dir_blocks: u8,  // Blocks to preallocate for dirs
    /* 0x0CE */ pub s_padding1: u16,

    // -- Journaling support (ext3 compat; read-only here) --
    /* 0x0D0 */ pub s_journal_uuid: [u8; 16],   // UUID of journal superblock
    /* 0x0E0 */ pub s_journal_inum: u32,        // Inode number of journal file
    /* 0x0E4 */ pub s_journal_dev: u32,         // Device number of journal file
    /* 0x0E8 */ pub s_last_orphan: u32,         // Head of orphan inode list
    /* 0x0EC */ pub s_hash_seed: [u32; 4],      // HTREE hash seed
    /* 0x0FC */ pub s_def_hash_version: u8,     // Default hash version
    /* 0x0FD */ pub s_reserved_char_pad: u8,
    /* 0x0FE */ pub s_reserved_word_pad: u16,
    /* 0x100 */ pub s_default_mount_opts: u32,  // Default mount options
    /* 0x104 */ pub s_first_meta_bg: u32,       // First metablock block group
    /* 0x108 */ pub s_reserved: [u32; 190],     // Reserved for future use
}

assert_eq_size!(Ext2Superblock, [u8; SUPERBLOCK_SIZE]);

impl Ext2Superblock {
    /// Decode a superblock from the 1024-byte region at device offset 1024.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, ScryError> {
        if buffer.len() < SUPERBLOCK_SIZE {
            return Err(ScryError::CorruptFilesystem(format!(
                "superblock region is {} bytes, need {}",
                buffer.len(),
                SUPERBLOCK_SIZE
            )));
        }
        let sb = unsafe { std::ptr::read_unaligned(buffer.as_ptr() as *const Ext2Superblock) };
        Ok(sb)
    }

    /// Reject anything that is not a structurally sound ext2 superblock.
    /// Every field checked here feeds later address arithmetic; a zero would
    /// turn into a division by zero downstream.
    pub fn validate(&self) -> Result<(), ScryError> {
        if self.s_magic != EXT2_SUPER_MAGIC {
            return Err(ScryError::CorruptFilesystem(format!(
                "bad superblock magic 0x{:04X}, expected 0x{:04X}",
                self.s_magic, EXT2_SUPER_MAGIC
            )));
        }
        if self.s_log_block_size > EXT2_MAX_BLOCK_LOG_SIZE {
            return Err(ScryError::CorruptFilesystem(format!(
                "unreasonable block size shift {}",
                self.s_log_block_size
            )));
        }
        if self.s_blocks_count == 0 || self.s_inodes_count == 0 {
            return Err(ScryError::CorruptFilesystem(
                "zero block or inode count".to_string(),
            ));
        }
        if self.s_blocks_per_group == 0 || self.s_inodes_per_group == 0 {
            return Err(ScryError::CorruptFilesystem(
                "zero blocks-per-group or inodes-per-group".to_string(),
            ));
        }
        let inode_size = self.inode_size();
        if inode_size < EXT2_GOOD_OLD_INODE_SIZE as u32
            || !inode_size.is_power_of_two()
            || inode_size > self.block_size()
        {
            return Err(ScryError::CorruptFilesystem(format!(
                "bad inode size {}",
                inode_size
            )));
        }
        if self.s_inodes_per_group > self.s_inodes_count {
            return Err(ScryError::CorruptFilesystem(format!(
                "inodes per group {} exceeds inode count {}",
                self.s_inodes_per_group, self.s_inodes_count
            )));
        }
        Ok(())
    }

    pub fn block_size(&self) -> u32 {
        EXT2_MIN_BLOCK_SIZE << self.s_log_block_size
    }

    /// Inode record size. Revision 0 fixed it at 128; dynamic revisions
    /// store it in the superblock.
    pub fn inode_size(&self) -> u32 {
        if self.s_rev_level == EXT2_GOOD_OLD_REV {
            EXT2_GOOD_OLD_INODE_SIZE as u32
        } else {
            self.s_inode_size as u32
        }
    }

    pub fn first_inode(&self) -> u32 {
        if self.s_rev_level == EXT2_GOOD_OLD_REV {
            EXT2_GOOD_OLD_FIRST_INO
        } else {
            self.s_first_ino
        }
    }

    /// Number of block groups: ceil(total_blocks / blocks_per_group).
    pub fn group_count(&self) -> u32 {
        ((self.s_blocks_count as u64).div_ceil(self.s_blocks_per_group as u64)) as u32
    }

    /// First block of the group descriptor table: the block immediately
    /// after the one holding the superblock.
    pub fn group_desc_block(&self) -> u64 {
        if self.block_size() == 1024 {
            2
        } else {
            1
        }
    }

    /// Incompat feature bits this engine does not understand.
    pub fn unsupported_incompat(&self) -> u32 {
        self.s_feature_incompat & !SUPPORTED_INCOMPAT_FEATURES
    }

    pub fn has_journal(&self) -> bool {
        self.s_feature_compat & EXT3_FEATURE_COMPAT_HAS_JOURNAL != 0
    }

    pub fn volume_label(&self) -> Option<String> {
        let label = String::from_utf8_lossy(&self.s_volume_name)
            .trim_end_matches('\0')
            .trim()
            .to_string();
        if label.is_empty() {
            None
        } else {
            Some(label)
        }
    }

    pub fn uuid_string(&self) -> Option<String> {
        let uuid = &self.s_uuid;
        if uuid.iter().all(|&b| b == 0) {
            return None;
        }
        Some(format!(
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            uuid[0], uuid[1], uuid[2], uuid[3],
            uuid[4], uuid[5],
            uuid[6], uuid[7],
            uuid[8], uuid[9],
            uuid[10], uuid[11], uuid[12], uuid[13], uuid[14], uuid[15]
        ))
    }
}

/// Block group descriptor (32 bytes). One per group, packed into the table
/// that starts right after the superblock's block.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Ext2GroupDesc {
    /* 0x00 */ pub bg_block_bitmap: u32,      // Block bitmap block
    /* 0x04 */ pub bg_inode_bitmap: u32,      // Inode bitmap block
    /* 0x08 */ pub bg_inode_table: u32,       // First inode table block
    /* 0x0C */ pub bg_free_blocks_count: u16, // Free blocks in group
    /* 0x0E */ pub bg_free_inodes_count: u16, // Free inodes in group
    /* 0x10 */ pub bg_used_dirs_count: u16,   // Directories in group
    /* 0x12 */ pub bg_pad: u16,
    /* 0x14 */ pub bg_reserved: [u8; 12],
}

assert_eq_size!(Ext2GroupDesc, [u8; GROUP_DESC_SIZE]);

impl Ext2GroupDesc {
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, ScryError> {
        if buffer.len() < GROUP_DESC_SIZE {
            return Err(ScryError::CorruptFilesystem(format!(
                "group descriptor record is {} bytes, need {}",
                buffer.len(),
                GROUP_DESC_SIZE
            )));
        }
        let gd = unsafe { std::ptr::read_unaligned(buffer.as_ptr() as *const Ext2GroupDesc) };
        Ok(gd)
    }
}

/// On-disk inode record (128 bytes). Dynamic-revision filesystems may store
/// larger records; the extra space holds attributes this engine does not
/// decode, so only the classic prefix is parsed.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Ext2Inode {
    /* 0x00 */ pub i_mode: u16,                   // File type and permissions
    /* 0x02 */ pub i_uid: u16,                    // Owner UID (low 16 bits)
    /* 0x04 */ pub i_size: u32,                   // Size in bytes (low 32 bits)
    /* 0x08 */ pub i_atime: u32,                  // Access time
    /* 0x0C */ pub i_ctime: u32,                  // Change time
    /* 0x10 */ pub i_mtime: u32,                  // Modification time
    /* 0x14 */ pub i_dtime: u32,                  // Deletion time
    /* 0x18 */ pub i_gid: u16,                    // Group GID (low 16 bits)
    /* 0x1A */ pub i_links_count: u16,            // Hard link count
    /* 0x1C */ pub i_blocks: u32,                 // Block count in 512-byte sectors
    /* 0x20 */ pub i_flags: u32,                  // Inode flags
    /* 0x24 */ pub i_osd1: u32,                   // OS-dependent
    /* 0x28 */ pub i_block: [u32; EXT2_N_BLOCKS], // 12 direct + single/double/triple indirect
    /* 0x64 */ pub i_generation: u32,             // File version (NFS)
    /* 0x68 */ pub i_file_acl: u32,               // Extended attribute block
    /* 0x6C */ pub i_dir_acl: u32,                // Size high bits for regular files
    /* 0x70 */ pub i_faddr: u32,                  // Fragment address
    /* 0x74 */ pub i_osd2: [u8; 12],              // OS-dependent
}

assert_eq_size!(Ext2Inode, [u8; 128]);

impl Ext2Inode {
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, ScryError> {
        if buffer.len() < 128 {
            return Err(ScryError::CorruptFilesystem(format!(
                "inode record is {} bytes, need at least 128",
                buffer.len()
            )));
        }
        let inode = unsafe { std::ptr::read_unaligned(buffer.as_ptr() as *const Ext2Inode) };
        Ok(inode)
    }

    pub fn is_dir(&self) -> bool {
        self.i_mode & S_IFMT == S_IFDIR
    }

    pub fn is_regular_file(&self) -> bool {
        self.i_mode & S_IFMT == S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.i_mode & S_IFMT == S_IFLNK
    }

    /// A fast symlink stores its target inside i_block itself and owns no
    /// data blocks at all.
    pub fn is_fast_symlink(&self) -> bool {
        self.is_symlink() && self.i_blocks == 0
    }

    /// File size in bytes. Regular files borrow i_dir_acl as the high
    /// 32 bits (the large-file extension); everything else is 32-bit.
    pub fn size(&self) -> u64 {
        if self.is_regular_file() {
            self.i_size as u64 | ((self.i_dir_acl as u64) << 32)
        } else {
            self.i_size as u64
        }
    }
}
