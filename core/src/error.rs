use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScryError {
    #[error("Device or image not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Read beyond device extent: {0}")]
    OutOfRange(String),

    #[error("Corrupt filesystem: {0}")]
    CorruptFilesystem(String),

    #[error("Invalid inode number: {0}")]
    InvalidInode(u32),

    #[error("Inode {0} is not a directory")]
    NotADirectory(u32),

    #[error("Unsupported filesystem: {0}")]
    UnsupportedFilesystem(String),
}
