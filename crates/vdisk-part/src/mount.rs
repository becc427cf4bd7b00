//! The process-wide mount registry.
//!
//! Mounting assigns a short ID of the shape `68<N><L>`: `L` is a per-disk
//! letter handed out in order starting at `'A'`, `N` a per-disk sequence
//! starting at 1. The registry itself never allocates disk space; mounting
//! only flips the partition's status byte (or the EBR's mount byte for a
//! logical partition).

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::disk::{open_disk, write_mbr};
use crate::ebr::{read_ebr, write_ebr};
use crate::manager::{locate_partition, PartitionKind};
use crate::{PartError, Result};

/// One mounted partition.
#[derive(Debug, Clone)]
pub struct MountedPartition {
    pub id: String,
    pub disk: PathBuf,
    pub name: String,
    pub letter: char,
    pub number: i64,
    pub start: i64,
    pub size: i64,
    pub kind: PartitionKind,
}

/// Registry of mounted partitions, keyed by `(disk path, partition name)`.
/// One instance lives for the whole process; disk letters are never reused
/// within a session even after every partition of a disk is unmounted.
#[derive(Debug, Default)]
pub struct MountRegistry {
    mounts: Vec<MountedPartition>,
    letters: HashMap<PathBuf, char>,
    counters: HashMap<PathBuf, i64>,
    next_letter: u8,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self {
            next_letter: 0,
            ..Self::default()
        }
    }

    pub fn mounted(&self) -> &[MountedPartition] {
        &self.mounts
    }

    pub fn find(&self, id: &str) -> Option<&MountedPartition> {
        self.mounts.iter().find(|m| m.id == id)
    }

    pub fn get(&self, id: &str) -> Result<&MountedPartition> {
        self.find(id)
            .ok_or_else(|| PartError::NotMounted(id.to_string()))
    }

    /// Mounts `name` from the disk at `path`, returning the assigned ID.
    pub fn mount(&mut self, path: &Path, name: &str) -> Result<String> {
        if self
            .mounts
            .iter()
            .any(|m| m.disk == path && m.name == name)
        {
            return Err(PartError::AlreadyMounted(name.to_string()));
        }

        let located = locate_partition(path, name)?;

        let letter = match self.letters.get(path) {
            Some(l) => *l,
            None => {
                let letter = (b'A' + self.next_letter) as char;
                self.next_letter += 1;
                self.letters.insert(path.to_path_buf(), letter);
                self.counters.insert(path.to_path_buf(), 0);
                letter
            }
        };
        let counter = self.counters.entry(path.to_path_buf()).or_insert(0);
        *counter += 1;
        let number = *counter;
        let id = format!("68{number}{letter}");

        let (mut file, mut mbr) = open_disk(path)?;
        match located.kind {
            PartitionKind::Logical => {
                let offset = located.ebr_offset.expect("logical partitions carry an EBR offset");
                set_ebr_mount(&mut file, offset, 1)?;
            }
            _ => {
                let index = located.mbr_index.expect("MBR partitions carry a slot index");
                mbr.partitions[index].mount(number, &id);
                write_mbr(&mut file, &mbr)?;
            }
        }

        log::debug!("mounted {}:{} as {}", path.display(), name, id);
        self.mounts.push(MountedPartition {
            id: id.clone(),
            disk: path.to_path_buf(),
            name: name.to_string(),
            letter,
            number,
            start: located.start,
            size: located.size,
            kind: located.kind,
        });
        Ok(id)
    }

    /// Unmounts by ID, releasing the per-disk sequence number and erasing the
    /// letter mapping once the disk has no mounts left.
    pub fn unmount(&mut self, id: &str) -> Result<()> {
        let position = self
            .mounts
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| PartError::NotMounted(id.to_string()))?;
        let mount = self.mounts.remove(position);

        if let Some(counter) = self.counters.get_mut(&mount.disk) {
            *counter -= 1;
            if *counter <= 0 {
                self.counters.remove(&mount.disk);
                self.letters.remove(&mount.disk);
            }
        }

        // Best effort on-disk status reset; the disk may already be gone.
        if mount.disk.exists() {
            let (mut file, mut mbr) = open_disk(&mount.disk)?;
            match mount.kind {
                PartitionKind::Logical => {
                    if let Ok(located) = locate_partition(&mount.disk, &mount.name) {
                        if let Some(offset) = located.ebr_offset {
                            set_ebr_mount(&mut file, offset, 0)?;
                        }
                    }
                }
                _ => {
                    if let Some(index) = mbr.find_by_name(&mount.name) {
                        mbr.partitions[index].unmount();
                        write_mbr(&mut file, &mbr)?;
                    }
                }
            }
        }
        log::debug!("unmounted {id}");
        Ok(())
    }
}

fn set_ebr_mount(file: &mut File, offset: i64, value: u8) -> Result<()> {
    let mut ebr = read_ebr(file, offset)?;
    ebr.mount = value;
    write_ebr(file, offset, &ebr)
}
