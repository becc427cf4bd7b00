//! Path normalization and resolution.

use crate::structures::inode::Inode;
use crate::{FsError, Result};

use super::{ExtFs, ROOT_INODE};

/// Ensures a single leading `/` and no trailing `/` (except for the root).
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// The non-empty segments of a path.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Splits a path into `(parent, file name)`; `/a.txt` → `("/", "a.txt")`.
pub fn split(path: &str) -> (String, String) {
    let normalized = normalize(path);
    let parts = components(&normalized);
    match parts.split_last() {
        None => ("/".to_string(), String::new()),
        Some((name, parents)) if parents.is_empty() => ("/".to_string(), name.to_string()),
        Some((name, parents)) => (format!("/{}", parents.join("/")), name.to_string()),
    }
}

/// Joins a parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

impl ExtFs {
    /// Walks the directory tree from the root, returning the inode number
    /// of `path`. Fails with `NotFound` at the first missing segment and
    /// `NotADirectory` when an intermediate segment is not a directory.
    pub fn resolve(&self, path: &str) -> Result<i32> {
        let normalized = normalize(path);
        let mut current = ROOT_INODE;
        for segment in components(&normalized) {
            let inode = self.read_inode(current)?;
            if !inode.is_dir() {
                return Err(FsError::NotADirectory(normalized.clone()));
            }
            current = self
                .find_in_dir(&inode, segment)?
                .ok_or_else(|| FsError::NotFound(normalized.clone()))?;
        }
        Ok(current)
    }

    /// Linearly scans the direct blocks of a directory for `name`.
    pub fn find_in_dir(&self, dir: &Inode, name: &str) -> Result<Option<i32>> {
        for block in dir.direct_blocks() {
            let dir_block = self.read_dir_block(block)?;
            if let Some(entry) = dir_block.find(name) {
                return Ok(Some(entry.inode));
            }
        }
        Ok(None)
    }
}
