//! Directory and file data blocks.

use vdisk_common::str::FixedStr;

/// Every data block is 64 bytes.
pub const BLOCK_SIZE: i64 = 64;

/// Entries per directory block.
pub const DIR_ENTRIES: usize = 4;

/// Directory entry names are NUL-padded with at most 12 bytes of content.
pub const DIR_NAME_LEN: usize = 12;

/// Marker for a free directory entry.
pub const FREE_ENTRY: i32 = -1;

/// One name → inode binding inside a directory block (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    pub name: FixedStr<DIR_NAME_LEN>,
    pub inode: i32,
}

unsafe impl bytemuck::Zeroable for DirEntry {}
unsafe impl bytemuck::NoUninit for DirEntry {}
unsafe impl bytemuck::AnyBitPattern for DirEntry {}

impl DirEntry {
    pub fn free() -> Self {
        Self {
            name: FixedStr::default(),
            inode: FREE_ENTRY,
        }
    }

    pub fn new(name: &str, inode: i32) -> Self {
        Self {
            name: FixedStr::new_truncate(name),
            inode,
        }
    }

    pub fn is_free(&self) -> bool {
        self.inode == FREE_ENTRY
    }

    pub fn clear(&mut self) {
        *self = Self::free();
    }
}

/// A directory data block: four fixed-width entries (64 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DirectoryBlock {
    pub entries: [DirEntry; DIR_ENTRIES],
}

unsafe impl bytemuck::Zeroable for DirectoryBlock {}
unsafe impl bytemuck::NoUninit for DirectoryBlock {}
unsafe impl bytemuck::AnyBitPattern for DirectoryBlock {}

impl DirectoryBlock {
    /// A block with every entry free.
    pub fn empty() -> Self {
        Self {
            entries: [DirEntry::free(); DIR_ENTRIES],
        }
    }

    /// The first block of a new directory: `.` points at the directory's own
    /// inode, `..` at the parent's.
    pub fn new_dir(self_inode: i32, parent_inode: i32) -> Self {
        let mut block = Self::empty();
        block.entries[0] = DirEntry::new(".", self_inode);
        block.entries[1] = DirEntry::new("..", parent_inode);
        block
    }

    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.entries
            .iter()
            .find(|e| !e.is_free() && e.name.matches(name))
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.is_free())
    }

    /// Occupied entries other than `.` and `..`.
    pub fn visible_entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| {
            !e.is_free() && !e.name.matches(".") && !e.name.matches("..") && !e.name.is_empty()
        })
    }
}

/// A file data block: 64 raw content bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FileBlock {
    pub content: [u8; BLOCK_SIZE as usize],
}

unsafe impl bytemuck::Zeroable for FileBlock {}
unsafe impl bytemuck::NoUninit for FileBlock {}
unsafe impl bytemuck::AnyBitPattern for FileBlock {}

impl FileBlock {
    pub fn from_slice(content: &[u8]) -> Self {
        let mut block = Self {
            content: [0; BLOCK_SIZE as usize],
        };
        let n = content.len().min(BLOCK_SIZE as usize);
        block.content[..n].copy_from_slice(&content[..n]);
        block
    }
}
