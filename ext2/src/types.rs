// Caller-facing record types. Every value here is an owned snapshot copied
// out of decoded bytes; nothing borrows from the device buffer.

use crate::constants::*;
use serde::{Deserialize, Serialize};

/// File type of an inode or directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Unknown,
    Regular,
    Directory,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Symlink,
}

impl FileType {
    /// From a directory entry's file-type tag (requires the filetype
    /// feature; tag 0 means the entry carries no type information).
    pub fn from_dirent_tag(tag: u8) -> Self {
        match tag {
            EXT2_FT_REG_FILE => FileType::Regular,
            EXT2_FT_DIR => FileType::Directory,
            EXT2_FT_CHRDEV => FileType::CharDevice,
            EXT2_FT_BLKDEV => FileType::BlockDevice,
            EXT2_FT_FIFO => FileType::Fifo,
            EXT2_FT_SOCK => FileType::Socket,
            EXT2_FT_SYMLINK => FileType::Symlink,
            _ => FileType::Unknown,
        }
    }

    /// From an inode's mode word.
    pub fn from_mode(mode: u16) -> Self {
        match mode & S_IFMT {
            S_IFREG => FileType::Regular,
            S_IFDIR => FileType::Directory,
            S_IFCHR => FileType::CharDevice,
            S_IFBLK => FileType::BlockDevice,
            S_IFIFO => FileType::Fifo,
            S_IFSOCK => FileType::Socket,
            S_IFLNK => FileType::Symlink,
            _ => FileType::Unknown,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileType::Unknown => "unknown",
            FileType::Regular => "regular",
            FileType::Directory => "directory",
            FileType::CharDevice => "character device",
            FileType::BlockDevice => "block device",
            FileType::Fifo => "fifo",
            FileType::Socket => "socket",
            FileType::Symlink => "symlink",
        };
        write!(f, "{}", s)
    }
}

/// Filesystem geometry and identity, decoded once at open time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperblockInfo {
    pub blocks_count: u32,
    pub free_blocks_count: u32,
    pub inodes_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub inode_size: u32,
    pub magic: u16,
    pub rev_level: u32,
    pub mount_count: u16,
    pub max_mount_count: u16,
    pub mount_time: u32,
    pub write_time: u32,
    pub last_check: u32,
    pub creator_os: u32,
    pub volume_label: Option<String>,
    pub uuid: Option<String>,
}

/// Metadata snapshot of a single inode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeInfo {
    pub number: u32,
    pub mode: u16,
    pub file_type: FileType,
    pub size: u64,
    pub links_count: u16,
    pub uid: u32,
    pub gid: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub flags: u32,
    /// Allocated block count in 512-byte sectors, as stored on disk.
    pub block_count: u32,
}

/// One entry of a directory listing, in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub inode: u32,
    pub file_type: FileType,
}

/// A match produced by the tree search: a root-relative path plus the
/// matched inode's number, size, and type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,
    pub inode: u32,
    pub size: u64,
    pub file_type: FileType,
}

/// Name matching policy for the tree search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Name equals the query exactly.
    Exact,
    /// Name contains the query, ignoring ASCII case.
    Substring,
}
