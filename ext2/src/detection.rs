// ext family detection from superblock feature bitmaps.

use crate::constants::*;
use crate::structures::Ext2Superblock;

/// Which member of the ext family a superblock describes. This engine only
/// decodes ext2-compatible layouts; the classification exists so rejections
/// and logs can name what was actually found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtVariant {
    Ext2,
    Ext3,
    Ext4,
}

impl std::fmt::Display for ExtVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtVariant::Ext2 => write!(f, "ext2"),
            ExtVariant::Ext3 => write!(f, "ext3"),
            ExtVariant::Ext4 => write!(f, "ext4"),
        }
    }
}

/// Classify a superblock by its feature flags.
///
/// ext4 announces itself through incompat/ro-compat features (extents,
/// 64-bit, metadata checksums); ext3 is ext2 plus a journal; anything
/// without either is plain ext2.
pub fn classify(sb: &Ext2Superblock) -> ExtVariant {
    let has_journal = sb.s_feature_compat & EXT3_FEATURE_COMPAT_HAS_JOURNAL != 0;
    let has_extents = sb.s_feature_incompat & EXT4_FEATURE_INCOMPAT_EXTENTS != 0;
    let has_64bit = sb.s_feature_incompat & EXT4_FEATURE_INCOMPAT_64BIT != 0;
    let has_metadata_csum = sb.s_feature_ro_compat & EXT4_FEATURE_RO_COMPAT_METADATA_CSUM != 0;

    if has_extents || has_64bit || has_metadata_csum {
        ExtVariant::Ext4
    } else if has_journal {
        ExtVariant::Ext3
    } else {
        ExtVariant::Ext2
    }
}

/// Probe raw superblock bytes (the 1024-byte region at device offset 1024)
/// for an ext filesystem, without constructing an engine. Returns the
/// detected variant, or None if the magic does not match.
pub fn probe(superblock_region: &[u8]) -> Option<ExtVariant> {
    let sb = Ext2Superblock::from_bytes(superblock_region).ok()?;
    if sb.s_magic != EXT2_SUPER_MAGIC {
        return None;
    }
    Some(classify(&sb))
}
