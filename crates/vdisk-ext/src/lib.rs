//! EXT2/EXT3-style filesystem engine for vdisk partitions.
//!
//! The filesystem lives inside a partition's byte range: a superblock,
//! (for EXT3) a fixed-capacity journal, inode and block bitmaps, the inode
//! table, and 64-byte data blocks. Inode 0 is the root directory and inode 1
//! the `users.txt` account database. On top of the engine sit a single-slot
//! session model with UGO permission checks and the UNIX-like high-level
//! operations (`mkdir`, `mkfile`, `cat`, `copy`, `move`, `find`, …).

pub mod fs;
pub mod ops;
pub mod perm;
pub mod report;
pub mod session;
pub mod structures;
pub mod users;

pub use fs::{ExtFs, FsKind};
pub use session::Session;

/// Errors produced by the filesystem layer.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Part(#[from] vdisk_part::PartError),

    #[error("partition does not hold a valid filesystem (bad magic)")]
    BadMagic,

    #[error("operation requires an EXT3 filesystem")]
    NotExt3,

    #[error("partition is too small to host a filesystem")]
    PartitionTooSmall,

    #[error("no free inodes left")]
    NoFreeInodes,

    #[error("no free blocks left")]
    NoFreeBlocks,

    #[error("directory '{0}' has no free entry left")]
    DirectoryFull(String),

    #[error("'{0}' is not a directory")]
    NotADirectory(String),

    #[error("'{0}' is not a regular file")]
    NotAFile(String),

    #[error("directory '{0}' is not empty")]
    NotEmpty(String),

    #[error("'{0}' already exists")]
    AlreadyExists(String),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("permission denied on '{0}'")]
    PermissionDenied(String),

    #[error("no active session")]
    NoSession,

    #[error("a session is already active")]
    SessionActive,

    #[error("operation requires root privileges")]
    NotRoot,

    #[error("invalid username or password")]
    BadCredentials,

    #[error("user '{0}' already exists")]
    UserExists(String),

    #[error("user '{0}' does not exist")]
    UserMissing(String),

    #[error("group '{0}' already exists")]
    GroupExists(String),

    #[error("group '{0}' does not exist")]
    GroupMissing(String),

    #[error("invalid parameter: {0}")]
    BadParam(String),

    #[error("the root directory cannot be removed")]
    RootProtected,
}

pub type Result<T> = std::result::Result<T, FsError>;
