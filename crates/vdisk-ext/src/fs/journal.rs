//! EXT3 journaling: append, inspection, replay recovery and simulated loss.
//!
//! The journal records what was *done*, not what is about to be done: every
//! mutating operation appends its entry after the data mutation succeeds.
//! Recovery therefore reformats the filesystem and replays the entries that
//! follow the last format marker.

use vdisk_common::io::{read_record_at, write_record_at, zero_range};

use crate::structures::block::BLOCK_SIZE;
use crate::structures::inode::{Perm, INODE_SIZE};
use crate::structures::journal::{JournalEntry, JOURNAL_CAPACITY, JOURNAL_ENTRY_SIZE};
use crate::{FsError, Result};

use super::path::split;
use super::ExtFs;

/// Byte offset of entry `index` inside the journal region (the first 8
/// bytes hold the entry count).
fn entry_offset(fs: &ExtFs, index: usize) -> u64 {
    fs.journal_offset() + 8 + index as u64 * JOURNAL_ENTRY_SIZE as u64
}

fn read_count(fs: &ExtFs) -> Result<i32> {
    let mut file = fs.host()?;
    let count: i32 = read_record_at(&mut file, fs.journal_offset())?;
    Ok(count.clamp(0, JOURNAL_CAPACITY as i32))
}

/// Appends one entry. A full journal drops the entry silently; recovery
/// still works with what was captured.
pub fn append(fs: &ExtFs, op: &str, path: &str, content: &str) -> Result<()> {
    if !fs.is_ext3() {
        return Err(FsError::NotExt3);
    }
    let count = read_count(fs)?;
    if count as usize >= JOURNAL_CAPACITY {
        log::warn!("journal is full, dropping entry {op} {path}");
        return Ok(());
    }

    let entry = JournalEntry::new(op, path, content);
    let mut file = fs.host()?;
    write_record_at(&mut file, entry_offset(fs, count as usize), &entry)?;
    write_record_at(&mut file, fs.journal_offset(), &(count + 1))?;
    file.sync_all()?;
    log::debug!("journal[{count}] {op} {path}");
    Ok(())
}

/// The valid journal entries in append order.
pub fn entries(fs: &ExtFs) -> Result<Vec<JournalEntry>> {
    if !fs.is_ext3() {
        return Err(FsError::NotExt3);
    }
    let count = read_count(fs)?;
    let mut file = fs.host()?;
    let mut out = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        let entry: JournalEntry = read_record_at(&mut file, entry_offset(fs, index))?;
        if entry.is_valid() {
            out.push(entry);
        }
    }
    Ok(out)
}

/// Zeroes both bitmaps, the inode table and the data area. The superblock
/// and the journal survive, so a later [`recover`] can rebuild the tree.
pub fn simulate_loss(fs: &ExtFs) -> Result<()> {
    if !fs.is_ext3() {
        return Err(FsError::NotExt3);
    }
    let sb = &fs.sb;
    let area_start = sb.bm_inode_start as i64;
    let area_end = sb.block_start as i64 + sb.blocks_count as i64 * BLOCK_SIZE;
    debug_assert_eq!(
        sb.inode_start as i64 + sb.inodes_count as i64 * INODE_SIZE,
        sb.block_start as i64
    );

    let mut file = fs.host()?;
    zero_range(
        &mut file,
        (fs.part_start() + area_start) as u64,
        (area_end - area_start) as u64,
    )?;
    file.sync_all()?;
    log::debug!("simulated loss: zeroed [{area_start}, {area_end})");
    Ok(())
}

/// Reformats the filesystem and replays the journal entries recorded after
/// the last format marker. The journal region itself is preserved, so
/// recovery can run again later.
pub fn recover(fs: &mut ExtFs) -> Result<()> {
    if !fs.is_ext3() {
        return Err(FsError::NotExt3);
    }
    let all = entries(fs)?;
    let replay_from = all
        .iter()
        .rposition(|e| e.is_format_marker())
        .map(|i| i + 1)
        .unwrap_or(0);

    fs.reformat_preserving_journal()?;

    for entry in &all[replay_from..] {
        if let Err(e) = replay(fs, entry) {
            log::warn!(
                "skipping journal replay of {} {}: {e}",
                entry.op(),
                entry.path()
            );
        }
    }
    log::debug!(
        "recovery replayed {} of {} journal entries",
        all.len() - replay_from,
        all.len()
    );
    Ok(())
}

/// Applies one journal entry. Replay runs with root ownership and the
/// recovery default permissions.
fn replay(fs: &mut ExtFs, entry: &JournalEntry) -> Result<()> {
    let perm = Perm::from_octal(664)?;
    let path = entry.path().to_string();
    match entry.op() {
        "mkdir" => {
            fs.ensure_dirs(&path, 1, 1, perm)?;
        }
        "mkfile" => {
            replay_write(fs, &path, entry.content().as_bytes())?;
        }
        "edit" => {
            replay_write(fs, &path, entry.content().as_bytes())?;
        }
        "remove" => {
            // Best effort: the target may never have existed in the
            // replayed prefix.
            if fs.resolve(&path).is_ok() {
                let _ = fs.remove_file(&path).or_else(|_| fs.remove_empty_dir(&path));
            }
        }
        other => {
            log::debug!("journal replay ignores op '{other}'");
        }
    }
    Ok(())
}

fn replay_write(fs: &mut ExtFs, path: &str, content: &[u8]) -> Result<()> {
    let perm = Perm::from_octal(664)?;
    let (parent, name) = split(path);
    let parent_ino = fs.ensure_dirs(&parent, 1, 1, perm)?;
    match fs.resolve(path) {
        Ok(ino) => fs.overwrite_file(ino, content),
        Err(_) => fs
            .create_file_at(parent_ino, &name, content, 1, 1, perm)
            .map(|_| ()),
    }
}
