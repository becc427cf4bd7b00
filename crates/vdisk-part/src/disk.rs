//! Disk image lifecycle: creation, validated open, removal, inspection.

use std::fs::{File, OpenOptions};
use std::path::Path;

use vdisk_common::io::{read_record_at, write_record_at};

use crate::fit::{free_gaps, Fit, Gap};
use crate::manager::{LogicalInfo, PartitionInfo};
use crate::mbr::{Mbr, MBR_SIZE};
use crate::{PartError, Result};

/// Creates a zero-filled disk image of exactly `size` bytes and stamps a
/// fresh MBR at offset 0. Parent directories are created as needed.
pub fn create_disk(path: &Path, size: i64, fit: Fit) -> Result<()> {
    if size <= MBR_SIZE {
        return Err(PartError::DiskTooSmall);
    }
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.set_len(size as u64)?;

    let mbr = Mbr::new(size, fit);
    write_record_at(&mut file, 0, &mbr)?;
    file.sync_all()?;
    log::debug!(
        "created disk {} ({} bytes, signature {})",
        path.display(),
        size,
        mbr.signature
    );
    Ok(())
}

/// Opens an existing disk read-write and returns its MBR.
pub fn open_disk(path: &Path) -> Result<(File, Mbr)> {
    if !path.exists() {
        return Err(PartError::DiskMissing(path.display().to_string()));
    }
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mbr: Mbr = read_record_at(&mut file, 0)?;
    if mbr.signature == 0 || mbr.size <= MBR_SIZE {
        return Err(PartError::BadParam(format!(
            "{} does not contain a valid master boot record",
            path.display()
        )));
    }
    Ok((file, mbr))
}

pub(crate) fn write_mbr(file: &mut File, mbr: &Mbr) -> Result<()> {
    write_record_at(file, 0, mbr)?;
    file.sync_all()?;
    Ok(())
}

/// Deletes the host file backing the disk.
pub fn remove_disk(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PartError::DiskMissing(path.display().to_string()));
    }
    std::fs::remove_file(path)?;
    Ok(())
}

/// A structured snapshot of a disk for display (`showdisk`, reports).
#[derive(Debug, Clone)]
pub struct DiskInfo {
    pub path: String,
    pub size: i64,
    pub created: i64,
    pub signature: i64,
    pub fit: Fit,
    pub partitions: Vec<PartitionInfo>,
    pub logicals: Vec<LogicalInfo>,
    pub free: Vec<Gap>,
}

pub fn disk_info(path: &Path) -> Result<DiskInfo> {
    let (mut file, mbr) = open_disk(path)?;
    let partitions = crate::manager::list_from_mbr(&mbr);
    let logicals = match mbr.extended() {
        Some(ext) => crate::manager::logicals_from_chain(&mut file, ext)?,
        None => Vec::new(),
    };
    let free = free_gaps(&mbr.occupied(), 0, mbr.size);

    Ok(DiskInfo {
        path: path.display().to_string(),
        size: mbr.size,
        created: mbr.created,
        signature: mbr.signature,
        fit: Fit::from_byte(mbr.fit).unwrap_or(Fit::First),
        partitions,
        logicals,
        free,
    })
}
