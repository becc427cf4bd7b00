//! Directory operations: entry management, creation, listing, removal.

use crate::structures::block::{DirEntry, DirectoryBlock, BLOCK_SIZE, DIR_NAME_LEN};
use crate::structures::inode::{FileKind, Inode, Perm, DIRECT_BLOCKS, FREE_PTR};
use crate::{FsError, Result};

use super::path::{join, split};
use super::{ExtFs, ROOT_INODE};

/// One row of a directory listing.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub inode: i32,
    pub kind: FileKind,
    pub size: i32,
    pub perm: Perm,
    pub uid: i32,
    pub gid: i32,
    pub atime: f64,
    pub ctime: f64,
    pub mtime: f64,
}

impl ExtFs {
    /// Adds `name → target` to the directory inode `dir_ino`. Existing
    /// blocks are searched for a free slot first; when all are full a new
    /// directory block is allocated at the first free direct pointer.
    pub fn add_dir_entry(&mut self, dir_ino: i32, name: &str, target: i32) -> Result<()> {
        if name.len() > DIR_NAME_LEN {
            return Err(FsError::BadParam(format!(
                "name '{name}' exceeds {DIR_NAME_LEN} bytes"
            )));
        }
        let mut dir = self.read_inode(dir_ino)?;

        for block in dir.direct_blocks() {
            let mut data = self.read_dir_block(block)?;
            if let Some(slot) = data.free_slot() {
                data.entries[slot] = DirEntry::new(name, target);
                return self.write_dir_block(block, &data);
            }
        }

        // Every assigned block is full: extend the directory.
        for i in 0..DIRECT_BLOCKS {
            if dir.block[i] == FREE_PTR {
                let block = self.alloc_block()?;
                let mut data = DirectoryBlock::empty();
                data.entries[0] = DirEntry::new(name, target);
                self.write_dir_block(block, &data)?;
                dir.block[i] = block;
                return self.write_inode(dir_ino, &dir);
            }
        }
        Err(FsError::DirectoryFull(name.to_string()))
    }

    /// Unlinks `name` from `dir_ino` (zeroes the name, frees the slot).
    pub fn remove_dir_entry(&mut self, dir_ino: i32, name: &str) -> Result<()> {
        let dir = self.read_inode(dir_ino)?;
        for block in dir.direct_blocks() {
            let mut data = self.read_dir_block(block)?;
            for entry in data.entries.iter_mut() {
                if !entry.is_free() && entry.name.matches(name) {
                    entry.clear();
                    return self.write_dir_block(block, &data);
                }
            }
        }
        Err(FsError::NotFound(name.to_string()))
    }

    /// Creates a directory under `parent_ino` and returns its inode number.
    pub fn create_dir_at(
        &mut self,
        parent_ino: i32,
        name: &str,
        uid: i32,
        gid: i32,
        perm: Perm,
    ) -> Result<i32> {
        let ino = self.alloc_inode()?;
        let block = match self.alloc_block() {
            Ok(block) => block,
            Err(e) => {
                self.free_inode(ino)?;
                return Err(e);
            }
        };

        let mut inode = Inode::new(FileKind::Directory, uid, gid, BLOCK_SIZE as i32, perm);
        inode.block[0] = block;
        self.write_dir_block(block, &DirectoryBlock::new_dir(ino, parent_ino))?;
        self.write_inode(ino, &inode)?;
        if let Err(e) = self.add_dir_entry(parent_ino, name, ino) {
            self.free_block(block)?;
            self.free_inode(ino)?;
            return Err(e);
        }
        Ok(ino)
    }

    /// `(name, inode)` pairs of all occupied entries excluding `.`/`..`.
    pub fn dir_children(&self, dir: &Inode) -> Result<Vec<(String, i32)>> {
        let mut children = Vec::new();
        for block in dir.direct_blocks() {
            let data = self.read_dir_block(block)?;
            for entry in data.visible_entries() {
                children.push((entry.name.as_str().to_string(), entry.inode));
            }
        }
        Ok(children)
    }

    /// Full listing of the directory at `path`, excluding `.`/`..`.
    pub fn list_dir(&self, path: &str) -> Result<Vec<EntryInfo>> {
        let ino = self.resolve(path)?;
        let dir = self.read_inode(ino)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }

        let mut rows = Vec::new();
        for (name, child_ino) in self.dir_children(&dir)? {
            let inode = self.read_inode(child_ino)?;
            rows.push(EntryInfo {
                name,
                inode: child_ino,
                kind: FileKind::from_byte(inode.kind).unwrap_or(FileKind::Regular),
                size: inode.size,
                perm: inode.perm(),
                uid: inode.uid,
                gid: inode.gid,
                atime: inode.atime,
                ctime: inode.ctime,
                mtime: inode.mtime,
            });
        }
        Ok(rows)
    }

    pub fn dir_is_empty(&self, dir: &Inode) -> Result<bool> {
        Ok(self.dir_children(dir)?.is_empty())
    }

    /// Removes the empty directory at `path`: frees its blocks and inode
    /// and unlinks it from the parent. Refuses non-empty directories and
    /// the root.
    pub fn remove_empty_dir(&mut self, path: &str) -> Result<()> {
        let ino = self.resolve(path)?;
        if ino == ROOT_INODE {
            return Err(FsError::RootProtected);
        }
        let mut inode = self.read_inode(ino)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        if !self.dir_is_empty(&inode)? {
            return Err(FsError::NotEmpty(path.to_string()));
        }

        let blocks: Vec<i32> = inode.direct_blocks().collect();
        for block in blocks {
            self.free_block(block)?;
        }
        inode.block = [FREE_PTR; 15];
        self.write_inode(ino, &inode)?;
        self.free_inode(ino)?;

        let (parent, name) = split(path);
        let parent_ino = self.resolve(&parent)?;
        self.remove_dir_entry(parent_ino, &name)
    }

    /// Creates every missing directory along `path` with the given owner
    /// and permissions, returning the final inode number.
    pub fn ensure_dirs(&mut self, path: &str, uid: i32, gid: i32, perm: Perm) -> Result<i32> {
        let normalized = super::path::normalize(path);
        let mut current_path = "/".to_string();
        let mut current = ROOT_INODE;
        for segment in super::path::components(&normalized) {
            let inode = self.read_inode(current)?;
            if !inode.is_dir() {
                return Err(FsError::NotADirectory(current_path));
            }
            current = match self.find_in_dir(&inode, segment)? {
                Some(ino) => ino,
                None => self.create_dir_at(current, segment, uid, gid, perm)?,
            };
            current_path = join(&current_path, segment);
        }
        Ok(current)
    }
}
