//! Regular file content I/O.

use crate::structures::block::{FileBlock, BLOCK_SIZE};
use crate::structures::inode::{FileKind, Inode, Perm, DIRECT_BLOCKS, FREE_PTR};
use crate::{FsError, Result};

use super::path::split;
use super::ExtFs;

/// Maximum file content the 12 direct blocks can hold. Longer content is
/// truncated on write (there are no indirect blocks).
pub const MAX_FILE_BYTES: usize = DIRECT_BLOCKS * BLOCK_SIZE as usize;

impl ExtFs {
    /// Reads a file's full content: up to 12 direct blocks, trimmed to the
    /// inode size.
    pub fn read_inode_content(&self, inode: &Inode) -> Result<Vec<u8>> {
        let mut content = Vec::with_capacity(inode.size as usize);
        let mut remaining = inode.size as usize;
        for block in inode.direct_blocks() {
            if remaining == 0 {
                break;
            }
            let data = self.read_file_block(block)?;
            let take = remaining.min(BLOCK_SIZE as usize);
            content.extend_from_slice(&data.content[..take]);
            remaining -= take;
        }
        Ok(content)
    }

    /// Frees every data block assigned to the inode and resets its
    /// pointers. The inode record itself is not persisted here.
    pub fn free_inode_blocks(&mut self, inode: &mut Inode) -> Result<()> {
        for i in 0..DIRECT_BLOCKS {
            if inode.block[i] != FREE_PTR {
                self.free_block(inode.block[i])?;
                inode.block[i] = FREE_PTR;
            }
        }
        Ok(())
    }

    /// Replaces the inode's content: frees the old blocks, allocates
    /// `ceil(len / 64)` fresh ones (capped at 12) and updates size and
    /// times. The inode record itself is not persisted here.
    pub fn write_blocks(&mut self, inode: &mut Inode, content: &[u8]) -> Result<()> {
        self.free_inode_blocks(inode)?;

        let content = if content.len() > MAX_FILE_BYTES {
            log::warn!(
                "content of {} bytes truncated to the {} direct-block limit",
                content.len(),
                MAX_FILE_BYTES
            );
            &content[..MAX_FILE_BYTES]
        } else {
            content
        };

        for (i, chunk) in content.chunks(BLOCK_SIZE as usize).enumerate() {
            let block = self.alloc_block()?;
            self.write_file_block(block, &FileBlock::from_slice(chunk))?;
            inode.block[i] = block;
        }
        inode.size = content.len() as i32;
        inode.touch_modified();
        Ok(())
    }

    /// Creates a regular file under `parent_ino` and returns its inode
    /// number.
    pub fn create_file_at(
        &mut self,
        parent_ino: i32,
        name: &str,
        content: &[u8],
        uid: i32,
        gid: i32,
        perm: Perm,
    ) -> Result<i32> {
        let ino = self.alloc_inode()?;
        let mut inode = Inode::new(FileKind::Regular, uid, gid, 0, perm);
        if let Err(e) = self.write_blocks(&mut inode, content) {
            self.free_inode(ino)?;
            return Err(e);
        }
        self.write_inode(ino, &inode)?;
        if let Err(e) = self.add_dir_entry(parent_ino, name, ino) {
            self.free_inode_blocks(&mut inode)?;
            self.free_inode(ino)?;
            return Err(e);
        }
        Ok(ino)
    }

    /// Overwrites the file at inode `ino` with new content.
    pub fn overwrite_file(&mut self, ino: i32, content: &[u8]) -> Result<()> {
        let mut inode = self.read_inode(ino)?;
        if !inode.is_file() {
            return Err(FsError::NotAFile(format!("inode {ino}")));
        }
        self.write_blocks(&mut inode, content)?;
        self.write_inode(ino, &inode)
    }

    /// Removes the file at `path`: frees its blocks and inode and unlinks
    /// the parent directory entry.
    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        let ino = self.resolve(path)?;
        let mut inode = self.read_inode(ino)?;
        if !inode.is_file() {
            return Err(FsError::NotAFile(path.to_string()));
        }
        self.free_inode_blocks(&mut inode)?;
        self.write_inode(ino, &inode)?;
        self.free_inode(ino)?;

        let (parent, name) = split(path);
        let parent_ino = self.resolve(&parent)?;
        self.remove_dir_entry(parent_ino, &name)
    }
}
