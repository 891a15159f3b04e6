// Directory block decoding.
//
// A directory's data blocks hold a packed run of variable-length records:
// an 8-byte header (inode, rec_len, name_len, file_type) followed by the
// name bytes. The last record's rec_len pads to the end of the block.

use crate::constants::*;
use crate::types::FileType;
use byteorder::{ByteOrder, LittleEndian};
use scry_core::ScryError;

/// One decoded directory record, still carrying its wire-level fields.
#[derive(Debug, Clone)]
pub struct RawDirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type_tag: u8,
    pub name: String,
}

impl RawDirEntry {
    pub fn file_type(&self) -> FileType {
        FileType::from_dirent_tag(self.file_type_tag)
    }
}

/// Decode one directory data block into its entries, in on-disk order.
///
/// Deleted-entry placeholders (inode 0) are skipped but do not terminate
/// decoding; "." and ".." are emitted like any other entry. A record whose
/// length is zero, shorter than its own header and name, or running past
/// the block boundary is a corruption signal.
pub fn decode_directory_block(block: &[u8]) -> Result<Vec<RawDirEntry>, ScryError> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < block.len() {
        if offset + DIRENT_HEADER_LEN > block.len() {
            return Err(ScryError::CorruptFilesystem(format!(
                "directory record header at offset {} overruns block",
                offset
            )));
        }

        let inode = LittleEndian::read_u32(&block[offset..offset + 4]);
        let rec_len = LittleEndian::read_u16(&block[offset + 4..offset + 6]);
        let name_len = block[offset + 6];
        let file_type_tag = block[offset + 7];

        if (rec_len as usize) < DIRENT_HEADER_LEN {
            return Err(ScryError::CorruptFilesystem(format!(
                "directory record at offset {} has length {}",
                offset, rec_len
            )));
        }
        if offset + rec_len as usize > block.len() {
            return Err(ScryError::CorruptFilesystem(format!(
                "directory record at offset {} (length {}) runs past block boundary",
                offset, rec_len
            )));
        }
        if DIRENT_HEADER_LEN + name_len as usize > rec_len as usize {
            return Err(ScryError::CorruptFilesystem(format!(
                "directory record at offset {} claims {}-byte name in {}-byte record",
                offset, name_len, rec_len
            )));
        }

        if inode != 0 {
            let name_bytes =
                &block[offset + DIRENT_HEADER_LEN..offset + DIRENT_HEADER_LEN + name_len as usize];
            entries.push(RawDirEntry {
                inode,
                rec_len,
                name_len,
                file_type_tag,
                name: String::from_utf8_lossy(name_bytes).to_string(),
            });
        }

        offset += rec_len as usize;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack entries the way mke2fs would: each record 4-byte aligned, the
    /// last one padded out to the block end.
    fn pack_block(block_size: usize, entries: &[(u32, u8, &str)]) -> Vec<u8> {
        let mut block = vec![0u8; block_size];
        let mut offset = 0usize;
        for (i, (inode, ftype, name)) in entries.iter().enumerate() {
            let name_len = name.len();
            let rec_len = if i == entries.len() - 1 {
                block_size - offset
            } else {
                (DIRENT_HEADER_LEN + name_len + 3) & !3
            };
            block[offset..offset + 4].copy_from_slice(&inode.to_le_bytes());
            block[offset + 4..offset + 6].copy_from_slice(&(rec_len as u16).to_le_bytes());
            block[offset + 6] = name_len as u8;
            block[offset + 7] = *ftype;
            block[offset + 8..offset + 8 + name_len].copy_from_slice(name.as_bytes());
            offset += rec_len;
        }
        block
    }

    #[test]
    fn decodes_entries_in_order() {
        let block = pack_block(
            1024,
            &[
                (2, EXT2_FT_DIR, "."),
                (2, EXT2_FT_DIR, ".."),
                (12, EXT2_FT_DIR, "docs"),
                (13, EXT2_FT_REG_FILE, "hello.txt"),
            ],
        );
        let entries = decode_directory_block(&block).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "..", "docs", "hello.txt"]);
        assert_eq!(entries[2].inode, 12);
        assert_eq!(entries[2].file_type(), FileType::Directory);
        assert_eq!(entries[3].file_type(), FileType::Regular);
    }

    #[test]
    fn deleted_entries_are_skipped_not_terminal() {
        let block = pack_block(
            1024,
            &[
                (2, EXT2_FT_DIR, "."),
                (0, EXT2_FT_UNKNOWN, "gone"), // deleted placeholder
                (13, EXT2_FT_REG_FILE, "kept.txt"),
            ],
        );
        let entries = decode_directory_block(&block).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "kept.txt"]);
    }

    #[test]
    fn zero_record_length_is_corruption() {
        let mut block = pack_block(1024, &[(2, EXT2_FT_DIR, "."), (13, EXT2_FT_REG_FILE, "x")]);
        // Stomp the second record's rec_len.
        block[12 + 4] = 0;
        block[12 + 5] = 0;
        let err = decode_directory_block(&block).unwrap_err();
        assert!(matches!(err, ScryError::CorruptFilesystem(_)));
    }

    #[test]
    fn record_past_block_boundary_is_corruption() {
        let mut block = pack_block(1024, &[(2, EXT2_FT_DIR, ".")]);
        // First record now claims to extend beyond the block.
        block[4..6].copy_from_slice(&2000u16.to_le_bytes());
        let err = decode_directory_block(&block).unwrap_err();
        assert!(matches!(err, ScryError::CorruptFilesystem(_)));
    }

    #[test]
    fn name_longer_than_record_is_corruption() {
        let mut block = pack_block(1024, &[(2, EXT2_FT_DIR, "."), (3, EXT2_FT_DIR, "sub")]);
        block[6] = 200; // "." record claims a 200-byte name in a 12-byte record
        let err = decode_directory_block(&block).unwrap_err();
        assert!(matches!(err, ScryError::CorruptFilesystem(_)));
    }
}
