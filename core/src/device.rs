// Sector-addressable, read-only access to a raw device or image file.
// Every structure the engine decodes is read through this layer.

use crate::error::ScryError;
use log::debug;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Read-only handle to a block device or filesystem image.
///
/// All reads are positioned: concurrent callers never share a cursor, so
/// overlapping `read_block` calls cannot corrupt each other's results.
#[derive(Debug)]
pub struct BlockDevice {
    file: File,
    size: u64,
    path: PathBuf,
}

impl BlockDevice {
    /// Open a device or image file for reading.
    ///
    /// Fails fast: a missing path is `NotFound`, a permission failure is
    /// `AccessDenied`, anything else is `IoError`. No partially-initialized
    /// handle escapes on failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScryError> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScryError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                ScryError::AccessDenied(path.display().to_string())
            }
            _ => ScryError::IoError(e),
        })?;

        // Regular files report their length in metadata; raw block devices
        // report zero there, so fall back to seeking to the end once.
        let mut size = file.metadata()?.len();
        if size == 0 {
            size = file.seek(SeekFrom::End(0))?;
        }

        debug!("Opened {} ({} bytes)", path.display(), size);

        Ok(BlockDevice {
            file,
            size,
            path: path.to_path_buf(),
        })
    }

    /// Total size of the device in bytes, determined once at open time.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read exactly `len` bytes at an absolute byte offset.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>, ScryError> {
        let end = offset
            .checked_add(len as u64)
            .ok_or_else(|| ScryError::OutOfRange(format!("offset {} overflows", offset)))?;
        if end > self.size {
            return Err(ScryError::OutOfRange(format!(
                "{} bytes at offset {} exceed device size {}",
                len, offset, self.size
            )));
        }

        let mut buffer = vec![0u8; len];
        self.read_exact_at(&mut buffer, offset)?;
        Ok(buffer)
    }

    /// Read one filesystem block: exactly `block_size` bytes at
    /// `block_number * block_size`.
    pub fn read_block(&self, block_number: u64, block_size: u32) -> Result<Vec<u8>, ScryError> {
        let offset = block_number.checked_mul(block_size as u64).ok_or_else(|| {
            ScryError::OutOfRange(format!("block number {} overflows", block_number))
        })?;
        self.read_at(offset, block_size as usize)
    }

    #[cfg(unix)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<(), ScryError> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    #[cfg(windows)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<(), ScryError> {
        use std::os::windows::fs::FileExt;
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = self.file.seek_read(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                return Err(ScryError::IoError(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "short read from device",
                )));
            }
            filled += n;
        }
        Ok(())
    }
}
