// ext2 metadata engine handle.
//
// Owns the open device plus the superblock and group descriptor table
// decoded once at open time. Every query is a pure function of those cached
// structures and positioned device reads, so the handle is safe to share
// across threads.

use crate::block_map::BlockMapResolver;
use crate::constants::*;
use crate::detection::{classify, ExtVariant};
use crate::dir::decode_directory_block;
use crate::search::Searcher;
use crate::structures::{Ext2GroupDesc, Ext2Inode, Ext2Superblock};
use crate::types::{DirectoryEntry, FileType, InodeInfo, MatchMode, SearchResult, SuperblockInfo};
use log::{debug, info};
use scry_core::{BlockDevice, ScryError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

// Cap on the shared block cache; directory walks revisit few distinct
// blocks, so a small cache is enough.
const BLOCK_CACHE_LIMIT: usize = 100;

/// Read-only handle to an ext2 filesystem.
#[derive(Debug)]
pub struct Ext2Reader {
    device: BlockDevice,
    superblock: Ext2Superblock,
    groups: Vec<Ext2GroupDesc>,
    block_size: u32,
    inode_size: u32,
    variant: ExtVariant,
    block_cache: Mutex<HashMap<u64, Vec<u8>>>,
}

impl Ext2Reader {
    /// Open a device or image file and decode its superblock and group
    /// descriptor table. Fails fast; no partially-initialized handle
    /// escapes.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScryError> {
        let path = path.as_ref();
        info!("Opening ext2 filesystem at {}", path.display());

        let device = BlockDevice::open(path)?;

        if device.size() < SUPERBLOCK_OFFSET + SUPERBLOCK_SIZE as u64 {
            return Err(ScryError::CorruptFilesystem(format!(
                "{} bytes is too small to contain an ext2 superblock",
                device.size()
            )));
        }

        let sb_bytes = device.read_at(SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE)?;
        let superblock = Ext2Superblock::from_bytes(&sb_bytes)?;
        superblock.validate()?;

        let variant = classify(&superblock);
        info!("Detected {} filesystem", variant);
        if superblock.has_journal() {
            debug!("Journal present (compat feature); ignored by this engine");
        }

        let unsupported = superblock.unsupported_incompat();
        if unsupported != 0 {
            return Err(ScryError::UnsupportedFilesystem(format!(
                "{} image with incompatible feature bits 0x{:x}",
                variant, unsupported
            )));
        }

        let groups = Self::read_group_table(&device, &superblock)?;

        Ok(Ext2Reader {
            block_size: superblock.block_size(),
            inode_size: superblock.inode_size(),
            device,
            superblock,
            groups,
            variant,
            block_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Decode the group descriptor table and sanity-check every descriptor
    /// against the filesystem extent, so structurally impossible tables are
    /// rejected at open time rather than on first use.
    fn read_group_table(
        device: &BlockDevice,
        sb: &Ext2Superblock,
    ) -> Result<Vec<Ext2GroupDesc>, ScryError> {
        let block_size = sb.block_size() as u64;
        let group_count = sb.group_count() as usize;
        let table_offset = sb.group_desc_block() * block_size;
        let table_len = group_count * GROUP_DESC_SIZE;

        if table_offset + table_len as u64 > device.size() {
            return Err(ScryError::CorruptFilesystem(format!(
                "group descriptor table ({} groups at offset {}) exceeds device size {}",
                group_count,
                table_offset,
                device.size()
            )));
        }

        let table = device.read_at(table_offset, table_len)?;
        let total_blocks = sb.s_blocks_count as u64;
        let inode_table_bytes = sb.s_inodes_per_group as u64 * sb.inode_size() as u64;

        let mut groups = Vec::with_capacity(group_count);
        for i in 0..group_count {
            let gd = Ext2GroupDesc::from_bytes(&table[i * GROUP_DESC_SIZE..])?;

            for (what, block) in [
                ("block bitmap", gd.bg_block_bitmap),
                ("inode bitmap", gd.bg_inode_bitmap),
                ("inode table", gd.bg_inode_table),
            ] {
                if block as u64 >= total_blocks {
                    return Err(ScryError::CorruptFilesystem(format!(
                        "group {}: {} at block {} beyond filesystem end ({} blocks)",
                        i, what, block, total_blocks
                    )));
                }
            }
            let table_end = gd.bg_inode_table as u64 * block_size + inode_table_bytes;
            if table_end > device.size() {
                return Err(ScryError::CorruptFilesystem(format!(
                    "group {}: inode table runs past device end",
                    i
                )));
            }

            groups.push(gd);
        }

        debug!("Read {} group descriptors", groups.len());
        Ok(groups)
    }

    /// Geometry and identity snapshot of the open filesystem.
    pub fn superblock_info(&self) -> SuperblockInfo {
        let sb = &self.superblock;
        SuperblockInfo {
            blocks_count: sb.s_blocks_count,
            free_blocks_count: sb.s_free_blocks_count,
            inodes_count: sb.s_inodes_count,
            free_inodes_count: sb.s_free_inodes_count,
            first_data_block: sb.s_first_data_block,
            block_size: self.block_size,
            blocks_per_group: sb.s_blocks_per_group,
            inodes_per_group: sb.s_inodes_per_group,
            inode_size: self.inode_size,
            magic: sb.s_magic,
            rev_level: sb.s_rev_level,
            mount_count: sb.s_mnt_count,
            max_mount_count: sb.s_max_mnt_count,
            mount_time: sb.s_mtime,
            write_time: sb.s_wtime,
            last_check: sb.s_lastcheck,
            creator_os: sb.s_creator_os,
            volume_label: sb.volume_label(),
            uuid: sb.uuid_string(),
        }
    }

    pub fn variant(&self) -> ExtVariant {
        self.variant
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Metadata snapshot of one inode.
    pub fn inode_info(&self, inode_number: u32) -> Result<InodeInfo, ScryError> {
        let inode = self.read_inode(inode_number)?;
        Ok(InodeInfo {
            number: inode_number,
            mode: inode.i_mode,
            file_type: FileType::from_mode(inode.i_mode),
            size: inode.size(),
            links_count: inode.i_links_count,
            uid: inode.i_uid as u32,
            gid: inode.i_gid as u32,
            atime: inode.i_atime,
            ctime: inode.i_ctime,
            mtime: inode.i_mtime,
            dtime: inode.i_dtime,
            flags: inode.i_flags,
            block_count: inode.i_blocks,
        })
    }

    /// Ordered data block numbers owned by an inode; `0` marks a hole in a
    /// sparse file. Inode kinds that store no block pointers (devices,
    /// fifos, sockets, fast symlinks) yield an empty map.
    pub fn block_map(&self, inode_number: u32) -> Result<Vec<u64>, ScryError> {
        let inode = self.read_inode(inode_number)?;

        match FileType::from_mode(inode.i_mode) {
            FileType::CharDevice | FileType::BlockDevice | FileType::Fifo | FileType::Socket => {
                return Ok(Vec::new())
            }
            _ => {}
        }
        if inode.is_fast_symlink() {
            return Ok(Vec::new());
        }

        let resolver = BlockMapResolver::new(
            &self.device,
            self.block_size,
            self.superblock.s_blocks_count as u64,
        );
        resolver.resolve(&inode)
    }

    /// Decode a directory inode into its entries: on-disk order, "." and
    /// ".." included, deleted placeholders skipped.
    pub fn list_directory(&self, inode_number: u32) -> Result<Vec<DirectoryEntry>, ScryError> {
        let inode = self.read_inode(inode_number)?;
        if !inode.is_dir() {
            return Err(ScryError::NotADirectory(inode_number));
        }

        let resolver = BlockMapResolver::new(
            &self.device,
            self.block_size,
            self.superblock.s_blocks_count as u64,
        );
        let blocks = resolver.resolve(&inode)?;

        let mut entries = Vec::new();
        for block in blocks {
            if block == 0 {
                continue;
            }
            let data = self.read_block(block)?;
            for raw in decode_directory_block(&data)? {
                entries.push(DirectoryEntry {
                    file_type: raw.file_type(),
                    name: raw.name,
                    inode: raw.inode,
                });
            }
        }
        Ok(entries)
    }

    /// Resolve a `/`-separated absolute path to an inode number, starting
    /// at the root directory.
    pub fn resolve_path(&self, path: &str) -> Result<u32, ScryError> {
        let mut current = EXT2_ROOT_INO;
        for component in path.split('/').filter(|s| !s.is_empty()) {
            let entries = self.list_directory(current)?;
            let entry = entries
                .iter()
                .find(|e| e.name == component)
                .ok_or_else(|| {
                    ScryError::NotFound(format!("path component '{}' not found", component))
                })?;
            current = entry.inode;
        }
        Ok(current)
    }

    /// Depth-first search of the whole tree for entries exactly matching
    /// `query`. See [`Searcher`] for traversal and error-skip semantics.
    pub fn search_by_name(&self, query: &str) -> Result<Vec<SearchResult>, ScryError> {
        self.search(query, MatchMode::Exact)
    }

    /// Tree search with an explicit matching policy.
    pub fn search(&self, query: &str, mode: MatchMode) -> Result<Vec<SearchResult>, ScryError> {
        Searcher::new(self).find_by_name(EXT2_ROOT_INO, query, mode)
    }

    /// Release the handle. Consuming the reader makes a double close
    /// unrepresentable.
    pub fn close(self) {
        debug!("Closing filesystem at {}", self.device.path().display());
    }

    /// Locate and decode an on-disk inode record by its 1-based number.
    pub(crate) fn read_inode(&self, inode_number: u32) -> Result<Ext2Inode, ScryError> {
        if inode_number == 0 || inode_number > self.superblock.s_inodes_count {
            return Err(ScryError::InvalidInode(inode_number));
        }

        let inodes_per_group = self.superblock.s_inodes_per_group;
        let group = ((inode_number - 1) / inodes_per_group) as usize;
        let index = (inode_number - 1) % inodes_per_group;

        let descriptor = self.groups.get(group).ok_or_else(|| {
            ScryError::CorruptFilesystem(format!(
                "inode {} maps to group {} but only {} groups exist",
                inode_number,
                group,
                self.groups.len()
            ))
        })?;

        let offset = descriptor.bg_inode_table as u64 * self.block_size as u64
            + index as u64 * self.inode_size as u64;
        let record = self
            .device
            .read_at(offset, self.inode_size as usize)
            .map_err(|e| match e {
                ScryError::OutOfRange(msg) => ScryError::CorruptFilesystem(msg),
                other => other,
            })?;

        Ext2Inode::from_bytes(&record)
    }

    /// Read one filesystem block through the shared bounded cache.
    pub(crate) fn read_block(&self, block: u64) -> Result<Vec<u8>, ScryError> {
        {
            let cache = self
                .block_cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(data) = cache.get(&block) {
                return Ok(data.clone());
            }
        }

        let data = self
            .device
            .read_block(block, self.block_size)
            .map_err(|e| match e {
                ScryError::OutOfRange(msg) => ScryError::CorruptFilesystem(msg),
                other => other,
            })?;

        let mut cache = self
            .block_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if cache.len() < BLOCK_CACHE_LIMIT {
            cache.insert(block, data.clone());
        }
        Ok(data)
    }
}
