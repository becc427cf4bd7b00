//! The filesystem engine: formatting, record I/O and allocation.

pub mod dir;
pub mod file;
pub mod journal;
pub mod path;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use vdisk_common::io::{read_bytes_at, read_record_at, write_bytes_at, write_record_at, zero_range};
use vdisk_part::mount::MountedPartition;

use crate::structures::bitmap::Bitmap;
use crate::structures::block::{DirectoryBlock, FileBlock, BLOCK_SIZE};
use crate::structures::inode::{FileKind, Inode, Perm, INODE_SIZE};
use crate::structures::superblock::{
    ext2_layout, ext3_layout, SuperBlock, SUPERBLOCK_REGION,
};
use crate::{FsError, Result};

pub use dir::EntryInfo;

/// Inode of the root directory.
pub const ROOT_INODE: i32 = 0;

/// Inode of the `users.txt` account database.
pub const USERS_INODE: i32 = 1;

/// Data block holding the root directory.
pub const ROOT_DIR_BLOCK: i32 = 0;

/// Head data block of `users.txt`. The blocks `USERS_HEAD_BLOCK + i` for
/// `i < DIRECT_BLOCKS` are reserved at format time so the users file can
/// grow in place with consecutive block indices.
pub const USERS_HEAD_BLOCK: i32 = 1;

pub const USERS_RESERVED_BLOCKS: i32 = crate::structures::inode::DIRECT_BLOCKS as i32;

/// Initial content of `users.txt`: the root group and the root user.
pub const INITIAL_USERS: &str = "1, G, root\n1, U, root, root, 123\n";

/// Filesystem flavor selected by `mkfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Ext2,
    Ext3,
}

impl FsKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "2fs" => Ok(Self::Ext2),
            "3fs" => Ok(Self::Ext3),
            other => Err(FsError::BadParam(format!(
                "unknown filesystem '{other}', expected 2fs or 3fs"
            ))),
        }
    }

    fn type_code(self) -> i32 {
        match self {
            Self::Ext2 => 2,
            Self::Ext3 => 3,
        }
    }
}

/// A filesystem living inside one partition of a disk image.
///
/// The handle keeps the superblock cached in memory; the host file is opened
/// and closed per operation, and every mutating path syncs before returning.
#[derive(Debug)]
pub struct ExtFs {
    disk: PathBuf,
    part_start: i64,
    part_size: i64,
    pub sb: SuperBlock,
}

impl ExtFs {
    /// Opens an already-formatted partition, validating the magic number.
    pub fn open(disk: &Path, part_start: i64, part_size: i64) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(disk)?;
        let sb: SuperBlock = read_record_at(&mut file, part_start as u64)?;
        if !sb.magic_ok() {
            return Err(FsError::BadMagic);
        }
        Ok(Self {
            disk: disk.to_path_buf(),
            part_start,
            part_size,
            sb,
        })
    }

    /// Opens the filesystem of a mounted partition.
    pub fn open_mounted(mount: &MountedPartition) -> Result<Self> {
        Self::open(&mount.disk, mount.start, mount.size)
    }

    /// Formats the partition, bootstrapping the root directory and
    /// `users.txt`. On EXT3 the journal is reset and a `mkfs` marker entry
    /// is appended.
    pub fn format(disk: &Path, part_start: i64, part_size: i64, kind: FsKind) -> Result<Self> {
        let mut fs = Self {
            disk: disk.to_path_buf(),
            part_start,
            part_size,
            sb: bytemuck::Zeroable::zeroed(),
        };
        fs.format_areas(kind, true)?;
        if kind == FsKind::Ext3 {
            journal::append(&fs, "mkfs", "/", "")?;
        }
        Ok(fs)
    }

    /// Rebuilds superblock, bitmaps, root directory and users.txt while
    /// leaving the journal region untouched. Used by journal recovery.
    pub(crate) fn reformat_preserving_journal(&mut self) -> Result<()> {
        let kind = if self.sb.is_ext3() {
            FsKind::Ext3
        } else {
            FsKind::Ext2
        };
        self.format_areas(kind, false)
    }

    fn format_areas(&mut self, kind: FsKind, reset_journal: bool) -> Result<()> {
        let layout = match kind {
            FsKind::Ext2 => ext2_layout(self.part_size)?,
            FsKind::Ext3 => ext3_layout(self.part_size)?,
        };
        let mut sb = SuperBlock::new(kind.type_code(), &layout);
        // Root directory block plus the reserved users.txt growth window.
        sb.free_blocks_count = sb.blocks_count - 1 - USERS_RESERVED_BLOCKS;
        sb.first_blo = USERS_HEAD_BLOCK + USERS_RESERVED_BLOCKS;
        self.sb = sb;

        let mut file = self.host()?;
        write_record_at(&mut file, self.part_start as u64, &self.sb)?;

        if kind == FsKind::Ext3 && reset_journal {
            zero_range(
                &mut file,
                (self.part_start + SUPERBLOCK_REGION) as u64,
                crate::structures::journal::JOURNAL_REGION_SIZE as u64,
            )?;
        }

        // Fresh bitmaps: inodes 0 and 1, the root directory block and the
        // users.txt window are taken.
        let mut inode_bm = Bitmap::new(self.sb.inodes_count as usize);
        inode_bm.set(ROOT_INODE as usize);
        inode_bm.set(USERS_INODE as usize);
        let mut block_bm = Bitmap::new(self.sb.blocks_count as usize);
        block_bm.set(ROOT_DIR_BLOCK as usize);
        for i in 0..USERS_RESERVED_BLOCKS {
            block_bm.set((USERS_HEAD_BLOCK + i) as usize);
        }
        write_bytes_at(
            &mut file,
            (self.part_start + self.sb.bm_inode_start as i64) as u64,
            inode_bm.as_bytes(),
        )?;
        write_bytes_at(
            &mut file,
            (self.part_start + self.sb.bm_block_start as i64) as u64,
            block_bm.as_bytes(),
        )?;

        // Root directory: inode 0, block 0, "." and ".." self-references,
        // plus the users.txt entry.
        let mut root = Inode::new(
            FileKind::Directory,
            1,
            1,
            BLOCK_SIZE as i32,
            Perm::from_octal(755)?,
        );
        root.block[0] = ROOT_DIR_BLOCK;
        let mut root_block = DirectoryBlock::new_dir(ROOT_INODE, ROOT_INODE);
        root_block.entries[2] = crate::structures::block::DirEntry::new("users.txt", USERS_INODE);

        // users.txt: inode 1, head block 1.
        let mut users = Inode::new(
            FileKind::Regular,
            1,
            1,
            INITIAL_USERS.len() as i32,
            Perm::from_octal(644)?,
        );
        users.block[0] = USERS_HEAD_BLOCK;

        write_record_at(&mut file, self.inode_offset(ROOT_INODE), &root)?;
        write_record_at(&mut file, self.inode_offset(USERS_INODE), &users)?;
        write_record_at(&mut file, self.block_offset(ROOT_DIR_BLOCK), &root_block)?;
        write_record_at(
            &mut file,
            self.block_offset(USERS_HEAD_BLOCK),
            &FileBlock::from_slice(INITIAL_USERS.as_bytes()),
        )?;
        file.sync_all()?;
        log::debug!(
            "formatted {:?} filesystem: {} inodes, {} blocks",
            kind,
            self.sb.inodes_count,
            self.sb.blocks_count
        );
        Ok(())
    }

    pub fn disk(&self) -> &Path {
        &self.disk
    }

    pub fn part_start(&self) -> i64 {
        self.part_start
    }

    pub fn part_size(&self) -> i64 {
        self.part_size
    }

    pub fn is_ext3(&self) -> bool {
        self.sb.is_ext3()
    }

    pub(crate) fn host(&self) -> Result<File> {
        Ok(OpenOptions::new().read(true).write(true).open(&self.disk)?)
    }

    pub(crate) fn inode_offset(&self, ino: i32) -> u64 {
        (self.part_start + self.sb.inode_start as i64 + ino as i64 * INODE_SIZE) as u64
    }

    pub(crate) fn block_offset(&self, block: i32) -> u64 {
        (self.part_start + self.sb.block_start as i64 + block as i64 * BLOCK_SIZE) as u64
    }

    pub(crate) fn journal_offset(&self) -> u64 {
        (self.part_start + SUPERBLOCK_REGION) as u64
    }

    fn persist_sb(&mut self) -> Result<()> {
        let mut file = self.host()?;
        write_record_at(&mut file, self.part_start as u64, &self.sb)?;
        file.sync_all()?;
        Ok(())
    }

    // Record I/O ----------------------------------------------------------

    pub fn read_inode(&self, ino: i32) -> Result<Inode> {
        let mut file = self.host()?;
        Ok(read_record_at(&mut file, self.inode_offset(ino))?)
    }

    pub fn write_inode(&self, ino: i32, inode: &Inode) -> Result<()> {
        let mut file = self.host()?;
        write_record_at(&mut file, self.inode_offset(ino), inode)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn read_dir_block(&self, block: i32) -> Result<DirectoryBlock> {
        let mut file = self.host()?;
        Ok(read_record_at(&mut file, self.block_offset(block))?)
    }

    pub fn write_dir_block(&self, block: i32, data: &DirectoryBlock) -> Result<()> {
        let mut file = self.host()?;
        write_record_at(&mut file, self.block_offset(block), data)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn read_file_block(&self, block: i32) -> Result<FileBlock> {
        let mut file = self.host()?;
        Ok(read_record_at(&mut file, self.block_offset(block))?)
    }

    pub fn write_file_block(&self, block: i32, data: &FileBlock) -> Result<()> {
        let mut file = self.host()?;
        write_record_at(&mut file, self.block_offset(block), data)?;
        file.sync_all()?;
        Ok(())
    }

    // Bitmaps -------------------------------------------------------------

    pub fn inode_bitmap(&self) -> Result<Bitmap> {
        let mut file = self.host()?;
        let bytes = read_bytes_at(
            &mut file,
            (self.part_start + self.sb.bm_inode_start as i64) as u64,
            self.sb.inodes_count as usize,
        )?;
        Ok(Bitmap::from_bytes(bytes, self.sb.inodes_count as usize))
    }

    pub fn block_bitmap(&self) -> Result<Bitmap> {
        let mut file = self.host()?;
        let bytes = read_bytes_at(
            &mut file,
            (self.part_start + self.sb.bm_block_start as i64) as u64,
            self.sb.blocks_count as usize,
        )?;
        Ok(Bitmap::from_bytes(bytes, self.sb.blocks_count as usize))
    }

    pub fn write_inode_bitmap(&self, bitmap: &Bitmap) -> Result<()> {
        let mut file = self.host()?;
        write_bytes_at(
            &mut file,
            (self.part_start + self.sb.bm_inode_start as i64) as u64,
            bitmap.as_bytes(),
        )?;
        file.sync_all()?;
        Ok(())
    }

    pub fn write_block_bitmap(&self, bitmap: &Bitmap) -> Result<()> {
        let mut file = self.host()?;
        write_bytes_at(
            &mut file,
            (self.part_start + self.sb.bm_block_start as i64) as u64,
            bitmap.as_bytes(),
        )?;
        file.sync_all()?;
        Ok(())
    }

    // Allocation ----------------------------------------------------------

    pub fn alloc_inode(&mut self) -> Result<i32> {
        let mut bitmap = self.inode_bitmap()?;
        let index = bitmap.find_first_clear().ok_or(FsError::NoFreeInodes)?;
        bitmap.set(index);
        self.write_inode_bitmap(&bitmap)?;
        self.sb.free_inodes_count -= 1;
        self.persist_sb()?;
        Ok(index as i32)
    }

    pub fn free_inode(&mut self, ino: i32) -> Result<()> {
        let mut bitmap = self.inode_bitmap()?;
        if bitmap.test(ino as usize) {
            bitmap.clear(ino as usize);
            self.write_inode_bitmap(&bitmap)?;
            self.sb.free_inodes_count += 1;
            self.persist_sb()?;
        }
        Ok(())
    }

    pub fn alloc_block(&mut self) -> Result<i32> {
        let mut bitmap = self.block_bitmap()?;
        let index = bitmap.find_first_clear().ok_or(FsError::NoFreeBlocks)?;
        bitmap.set(index);
        self.write_block_bitmap(&bitmap)?;
        self.sb.free_blocks_count -= 1;
        self.persist_sb()?;
        Ok(index as i32)
    }

    pub fn free_block(&mut self, block: i32) -> Result<()> {
        // The users.txt growth window stays reserved for the lifetime of
        // the filesystem.
        if (USERS_HEAD_BLOCK..USERS_HEAD_BLOCK + USERS_RESERVED_BLOCKS).contains(&block) {
            return Ok(());
        }
        let mut bitmap = self.block_bitmap()?;
        if bitmap.test(block as usize) {
            bitmap.clear(block as usize);
            self.write_block_bitmap(&bitmap)?;
            self.sb.free_blocks_count += 1;
            self.persist_sb()?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::structures::inode::DIRECT_BLOCKS;

    pub(crate) fn scratch_fs(kind: FsKind, part_size: i64) -> (tempfile::TempDir, ExtFs) {
        let dir = tempfile::tempdir().unwrap();
        let disk = dir.path().join("fs.img");
        let file = std::fs::File::create(&disk).unwrap();
        file.set_len((1024 + part_size) as u64).unwrap();
        drop(file);
        let fs = ExtFs::format(&disk, 1024, part_size, kind).unwrap();
        (dir, fs)
    }

    #[test]
    fn format_bootstraps_root_and_users() {
        let (_dir, fs) = scratch_fs(FsKind::Ext2, 1024 * 1024);

        let root = fs.read_inode(ROOT_INODE).unwrap();
        assert!(root.is_dir());
        assert_eq!(root.perm().to_octal(), 755);
        assert_eq!(root.block[0], ROOT_DIR_BLOCK);

        let block = fs.read_dir_block(ROOT_DIR_BLOCK).unwrap();
        assert_eq!(block.entries[0].name.as_str(), ".");
        assert_eq!(block.entries[1].name.as_str(), "..");
        assert_eq!(block.find("users.txt").unwrap().inode, USERS_INODE);

        let users = fs.read_inode(USERS_INODE).unwrap();
        assert!(users.is_file());
        assert_eq!(users.perm().to_octal(), 644);
        assert_eq!(users.size as usize, INITIAL_USERS.len());

        let content = fs.read_inode_content(&users).unwrap();
        assert_eq!(content, INITIAL_USERS.as_bytes());
    }

    #[test]
    fn open_rejects_unformatted_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let disk = dir.path().join("raw.img");
        std::fs::write(&disk, vec![0u8; 64 * 1024]).unwrap();
        assert!(matches!(
            ExtFs::open(&disk, 1024, 32 * 1024),
            Err(FsError::BadMagic)
        ));
    }

    #[test]
    fn allocation_updates_bitmap_and_counters() {
        let (_dir, mut fs) = scratch_fs(FsKind::Ext2, 1024 * 1024);
        let free_inodes = fs.sb.free_inodes_count;
        let free_blocks = fs.sb.free_blocks_count;

        let ino = fs.alloc_inode().unwrap();
        assert_eq!(ino, 2);
        let block = fs.alloc_block().unwrap();
        assert_eq!(block, USERS_HEAD_BLOCK + DIRECT_BLOCKS as i32);
        assert_eq!(fs.sb.free_inodes_count, free_inodes - 1);
        assert_eq!(fs.sb.free_blocks_count, free_blocks - 1);

        // Reopening reads the persisted superblock back.
        let reopened = ExtFs::open(fs.disk(), fs.part_start(), fs.part_size()).unwrap();
        assert_eq!(reopened.sb.free_inodes_count, free_inodes - 1);

        fs.free_block(block).unwrap();
        fs.free_inode(ino).unwrap();
        assert_eq!(fs.sb.free_inodes_count, free_inodes);
        assert_eq!(fs.sb.free_blocks_count, free_blocks);
    }

    #[test]
    fn users_window_is_never_freed() {
        let (_dir, mut fs) = scratch_fs(FsKind::Ext2, 1024 * 1024);
        let free_blocks = fs.sb.free_blocks_count;
        fs.free_block(USERS_HEAD_BLOCK).unwrap();
        fs.free_block(USERS_HEAD_BLOCK + 3).unwrap();
        assert_eq!(fs.sb.free_blocks_count, free_blocks);
        let bitmap = fs.block_bitmap().unwrap();
        assert!(bitmap.test(USERS_HEAD_BLOCK as usize));
    }

    #[test]
    fn ext3_format_writes_a_mkfs_marker() {
        let (_dir, fs) = scratch_fs(FsKind::Ext3, 1024 * 1024);
        assert!(fs.is_ext3());
        let entries = journal::entries(&fs).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].op(), "mkfs");
        assert!(entries[0].is_format_marker());
    }
}
