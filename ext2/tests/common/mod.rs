// Test support: builds small ext2 images byte-by-byte so the reader can be
// exercised against known-good (and deliberately broken) layouts without
// shelling out to mke2fs.
#![allow(dead_code)]

use std::io::Write;
use tempfile::NamedTempFile;

pub const BLOCK_SIZE: u32 = 1024;
pub const INODE_SIZE: u32 = 128;

const SUPERBLOCK_BASE: usize = 1024;
const GDT_BLOCK: u32 = 2;
const EXT2_MAGIC: u16 = 0xEF53;
const INCOMPAT_FILETYPE: u32 = 0x0002;

pub const FT_REG: u8 = 1;
pub const FT_DIR: u8 = 2;
pub const FT_SYMLINK: u8 = 7;

pub const MODE_DIR: u16 = 0x4000 | 0o755;
pub const MODE_REG: u16 = 0x8000 | 0o644;
pub const MODE_SYMLINK: u16 = 0xA000 | 0o777;

// Fixed timestamps so tests can assert exact values.
pub const FIXTURE_MTIME: u32 = 1_700_000_001;
pub const FIXTURE_WTIME: u32 = 1_700_000_002;

/// Everything an inode record needs; defaults describe an empty file.
#[derive(Clone)]
pub struct InodeSpec {
    pub mode: u16,
    pub uid: u16,
    pub gid: u16,
    pub size: u32,
    pub links: u16,
    /// 512-byte sectors, as stored in i_blocks.
    pub blocks: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub flags: u32,
    pub block: [u32; 15],
}

impl Default for InodeSpec {
    fn default() -> Self {
        InodeSpec {
            mode: MODE_REG,
            uid: 0,
            gid: 0,
            size: 0,
            links: 1,
            blocks: 0,
            atime: FIXTURE_MTIME,
            ctime: FIXTURE_MTIME,
            mtime: FIXTURE_MTIME,
            dtime: 0,
            flags: 0,
            block: [0; 15],
        }
    }
}

pub struct ImageBuilder {
    image: Vec<u8>,
    pub total_blocks: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub group_count: u32,
    pub inodes_count: u32,
    inode_tables: Vec<u32>,
    next_free: u32,
    highest_ino: u32,
}

impl ImageBuilder {
    /// Single-group image with 32 inodes; enough for most fixtures.
    pub fn new(total_blocks: u32) -> Self {
        Self::with_geometry(total_blocks, 8192, 32)
    }

    pub fn with_geometry(total_blocks: u32, blocks_per_group: u32, inodes_per_group: u32) -> Self {
        let group_count = (total_blocks + blocks_per_group - 1) / blocks_per_group;
        assert!(
            group_count as usize * 32 <= BLOCK_SIZE as usize,
            "group descriptor table must fit one block"
        );

        let mut builder = ImageBuilder {
            image: vec![0u8; total_blocks as usize * BLOCK_SIZE as usize],
            total_blocks,
            blocks_per_group,
            inodes_per_group,
            group_count,
            inodes_count: group_count * inodes_per_group,
            inode_tables: Vec::new(),
            next_free: GDT_BLOCK + 1,
            highest_ino: 10,
        };

        let table_blocks = (inodes_per_group * INODE_SIZE + BLOCK_SIZE - 1) / BLOCK_SIZE;
        for g in 0..group_count {
            let block_bitmap = builder.alloc_block();
            let inode_bitmap = builder.alloc_block();
            let inode_table = builder.next_free;
            builder.next_free += table_blocks;
            builder.inode_tables.push(inode_table);

            let base = (GDT_BLOCK * BLOCK_SIZE) as usize + g as usize * 32;
            builder.put_u32(base, block_bitmap);
            builder.put_u32(base + 4, inode_bitmap);
            builder.put_u32(base + 8, inode_table);
            builder.put_u16(base + 14, inodes_per_group as u16);
        }

        builder.write_superblock();
        builder
    }

    fn write_superblock(&mut self) {
        let b = SUPERBLOCK_BASE;
        self.put_u32(b, self.inodes_count);
        self.put_u32(b + 0x04, self.total_blocks);
        self.put_u32(b + 0x14, 1); // first data block
        self.put_u32(b + 0x18, 0); // log block size -> 1024
        self.put_u32(b + 0x20, self.blocks_per_group);
        self.put_u32(b + 0x28, self.inodes_per_group);
        self.put_u32(b + 0x2C, FIXTURE_MTIME);
        self.put_u32(b + 0x30, FIXTURE_WTIME);
        self.put_u16(b + 0x34, 3); // mount count
        self.put_u16(b + 0x36, 25); // max mount count
        self.put_u16(b + 0x38, EXT2_MAGIC);
        self.put_u16(b + 0x3A, 1); // clean state
        self.put_u32(b + 0x40, 1_700_000_000); // last check
        self.put_u32(b + 0x4C, 1); // dynamic revision
        self.put_u32(b + 0x54, 11); // first non-reserved inode
        self.put_u16(b + 0x58, INODE_SIZE as u16);
        self.put_u32(b + 0x60, INCOMPAT_FILETYPE);
        for i in 0..16 {
            self.image[b + 0x68 + i] = 0x40 + i as u8; // uuid
        }
        let label = b"SCRYTEST";
        self.image[b + 0x78..b + 0x78 + label.len()].copy_from_slice(label);
    }

    /// Claim the next unused block.
    pub fn alloc_block(&mut self) -> u32 {
        assert!(self.next_free < self.total_blocks, "image out of blocks");
        let block = self.next_free;
        self.next_free += 1;
        block
    }

    pub fn write_block(&mut self, block: u32, data: &[u8]) {
        assert!(data.len() <= BLOCK_SIZE as usize);
        let offset = block as usize * BLOCK_SIZE as usize;
        self.image[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Write a block of little-endian block pointers (an indirect block).
    pub fn write_pointer_block(&mut self, block: u32, pointers: &[u32]) {
        let mut data = vec![0u8; BLOCK_SIZE as usize];
        for (i, p) in pointers.iter().enumerate() {
            data[i * 4..i * 4 + 4].copy_from_slice(&p.to_le_bytes());
        }
        self.write_block(block, &data);
    }

    /// Write an inode record into the proper group's inode table.
    pub fn write_inode(&mut self, ino: u32, spec: &InodeSpec) {
        assert!(ino >= 1 && ino <= self.inodes_count, "inode {} out of range", ino);
        let group = (ino - 1) / self.inodes_per_group;
        let index = (ino - 1) % self.inodes_per_group;
        let base = self.inode_tables[group as usize] as usize * BLOCK_SIZE as usize
            + index as usize * INODE_SIZE as usize;

        self.put_u16(base, spec.mode);
        self.put_u16(base + 0x02, spec.uid);
        self.put_u32(base + 0x04, spec.size);
        self.put_u32(base + 0x08, spec.atime);
        self.put_u32(base + 0x0C, spec.ctime);
        self.put_u32(base + 0x10, spec.mtime);
        self.put_u32(base + 0x14, spec.dtime);
        self.put_u16(base + 0x18, spec.gid);
        self.put_u16(base + 0x1A, spec.links);
        self.put_u32(base + 0x1C, spec.blocks);
        self.put_u32(base + 0x20, spec.flags);
        for (i, ptr) in spec.block.iter().enumerate() {
            self.put_u32(base + 0x28 + i * 4, *ptr);
        }

        self.highest_ino = self.highest_ino.max(ino);
    }

    /// Pack directory entries the way the kernel does: 4-byte-aligned
    /// records, the last one padded out to the block end.
    pub fn dir_block_data(entries: &[(u32, u8, &str)]) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE as usize];
        let mut offset = 0usize;
        for (i, (ino, ftype, name)) in entries.iter().enumerate() {
            let name_len = name.len();
            let rec_len = if i == entries.len() - 1 {
                BLOCK_SIZE as usize - offset
            } else {
                (8 + name_len + 3) & !3
            };
            block[offset..offset + 4].copy_from_slice(&ino.to_le_bytes());
            block[offset + 4..offset + 6].copy_from_slice(&(rec_len as u16).to_le_bytes());
            block[offset + 6] = name_len as u8;
            block[offset + 7] = *ftype;
            block[offset + 8..offset + 8 + name_len].copy_from_slice(name.as_bytes());
            offset += rec_len;
        }
        block
    }

    /// Create a one-block directory: allocates its block, writes "." and
    /// ".." plus the given children, and writes the inode. Returns the
    /// directory's data block.
    pub fn add_directory(&mut self, ino: u32, parent: u32, children: &[(u32, u8, &str)]) -> u32 {
        let block = self.alloc_block();
        let mut entries: Vec<(u32, u8, &str)> = vec![(ino, FT_DIR, "."), (parent, FT_DIR, "..")];
        entries.extend_from_slice(children);
        let data = Self::dir_block_data(&entries);
        self.write_block(block, &data);

        let subdirs = children.iter().filter(|(_, ft, _)| *ft == FT_DIR).count() as u16;
        let mut spec = InodeSpec {
            mode: MODE_DIR,
            size: BLOCK_SIZE,
            links: 2 + subdirs,
            blocks: 2,
            ..Default::default()
        };
        spec.block[0] = block;
        self.write_inode(ino, &spec);
        block
    }

    /// Create a regular file backed by freshly allocated direct blocks.
    pub fn add_file(&mut self, ino: u32, size: u32) -> Vec<u32> {
        let nblocks = ((size + BLOCK_SIZE - 1) / BLOCK_SIZE) as usize;
        assert!(nblocks <= 12, "add_file only handles direct blocks");
        let mut spec = InodeSpec {
            size,
            blocks: (nblocks * 2) as u32,
            ..Default::default()
        };
        let mut blocks = Vec::with_capacity(nblocks);
        for i in 0..nblocks {
            let block = self.alloc_block();
            spec.block[i] = block;
            blocks.push(block);
        }
        self.write_inode(ino, &spec);
        blocks
    }

    /// Finish the image: patch free counts, return the raw bytes.
    pub fn build(mut self) -> Vec<u8> {
        let free_blocks = self.total_blocks.saturating_sub(self.next_free);
        let free_inodes = self.inodes_count.saturating_sub(self.highest_ino);
        self.put_u32(SUPERBLOCK_BASE + 0x0C, free_blocks);
        self.put_u32(SUPERBLOCK_BASE + 0x10, free_inodes);
        self.image
    }

    pub fn into_temp_file(self) -> NamedTempFile {
        write_image(&self.build())
    }

    fn put_u16(&mut self, offset: usize, value: u16) {
        self.image[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, offset: usize, value: u32) {
        self.image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

pub fn write_image(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

// Inode numbers used by the standard fixture.
pub const ROOT_INO: u32 = 2;
pub const LOST_FOUND_INO: u32 = 11;
pub const DOCS_INO: u32 = 12;
pub const HELLO_INO: u32 = 13;
pub const REPORT_INO: u32 = 14;
pub const NOTES_INO: u32 = 15;

pub const HELLO_SIZE: u32 = 612;
pub const REPORT_SIZE: u32 = 1536;

/// A small, well-formed filesystem:
///
/// ```text
/// /
/// ├── lost+found/
/// ├── docs/
/// │   ├── report.txt
/// │   └── notes/
/// └── hello.txt
/// ```
pub fn standard_image() -> ImageBuilder {
    let mut b = ImageBuilder::new(256);
    b.add_directory(
        ROOT_INO,
        ROOT_INO,
        &[
            (LOST_FOUND_INO, FT_DIR, "lost+found"),
            (DOCS_INO, FT_DIR, "docs"),
            (HELLO_INO, FT_REG, "hello.txt"),
        ],
    );
    b.add_directory(LOST_FOUND_INO, ROOT_INO, &[]);
    b.add_directory(
        DOCS_INO,
        ROOT_INO,
        &[
            (REPORT_INO, FT_REG, "report.txt"),
            (NOTES_INO, FT_DIR, "notes"),
        ],
    );
    b.add_directory(NOTES_INO, DOCS_INO, &[]);
    b.add_file(HELLO_INO, HELLO_SIZE);
    b.add_file(REPORT_INO, REPORT_SIZE);
    b
}

pub fn standard_fixture() -> NamedTempFile {
    standard_image().into_temp_file()
}
