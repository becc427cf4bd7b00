//! On-disk records of the filesystem.
//!
//! All records are little-endian `#[repr(C)]` types with explicit padding so
//! their in-memory layout is the on-disk layout. The `bitmap` module holds
//! the MSB-first bit operations shared by the inode and block bitmaps.

pub mod bitmap;
pub mod block;
pub mod inode;
pub mod journal;
pub mod superblock;

pub use bitmap::Bitmap;
pub use block::{DirEntry, DirectoryBlock, FileBlock, BLOCK_SIZE, DIR_ENTRIES, DIR_NAME_LEN};
pub use inode::{Access, FileKind, Inode, Perm, DIRECT_BLOCKS, FREE_PTR, INODE_SIZE};
pub use journal::{JournalEntry, JOURNAL_CAPACITY, JOURNAL_ENTRY_SIZE, JOURNAL_REGION_SIZE};
pub use superblock::{SuperBlock, EXT2_MAGIC, SUPERBLOCK_REGION};
