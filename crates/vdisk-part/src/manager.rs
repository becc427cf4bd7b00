//! Partition creation, deletion, resizing and listing.

use std::fs::File;
use std::path::Path;

use vdisk_common::io::zero_range;
use vdisk_common::str::FixedStr;

use crate::disk::{open_disk, write_mbr};
use crate::ebr::{read_ebr, walk_chain, write_ebr, Ebr, EBR_END, EBR_SIZE};
use crate::fit::{find_gap, Fit};
use crate::mbr::{Mbr, Partition, PARTITION_NAME_LEN};
use crate::{PartError, Result};

/// Partition type as stored in the MBR `kind` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Primary,
    Extended,
    Logical,
}

impl PartitionKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "P" => Ok(Self::Primary),
            "E" => Ok(Self::Extended),
            "L" => Ok(Self::Logical),
            other => Err(PartError::BadParam(format!(
                "unknown partition type '{other}', expected P, E or L"
            ))),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Primary => b'P',
            Self::Extended => b'E',
            Self::Logical => b'L',
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'P' => Some(Self::Primary),
            b'E' => Some(Self::Extended),
            b'L' => Some(Self::Logical),
            _ => None,
        }
    }
}

/// Parameters for `create_partition`.
#[derive(Debug, Clone)]
pub struct PartitionSpec {
    pub name: String,
    pub size: i64,
    pub kind: PartitionKind,
    pub fit: Fit,
}

/// Deletion mode: `Fast` clears the table entry, `Full` also zeroes the
/// partition's byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Fast,
    Full,
}

impl DeleteMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FAST" => Ok(Self::Fast),
            "FULL" => Ok(Self::Full),
            other => Err(PartError::BadParam(format!(
                "unknown delete mode '{other}', expected FAST or FULL"
            ))),
        }
    }
}

/// Display row for one MBR partition.
#[derive(Debug, Clone)]
pub struct PartitionInfo {
    pub name: String,
    pub kind: PartitionKind,
    pub start: i64,
    pub size: i64,
    pub mounted: bool,
    pub id: String,
    pub fit: Option<Fit>,
}

/// Display row for one logical partition.
#[derive(Debug, Clone)]
pub struct LogicalInfo {
    pub name: String,
    pub start: i64,
    pub size: i64,
    pub mounted: bool,
    pub ebr_offset: i64,
    pub next: i64,
    pub fit: Option<Fit>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PartError::BadParam("partition name is required".into()));
    }
    if name.len() > PARTITION_NAME_LEN {
        return Err(PartError::BadParam(format!(
            "partition name '{name}' exceeds {PARTITION_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

fn logical_names(file: &mut File, ext: &Partition) -> Result<Vec<String>> {
    let chain = chain_of(file, ext)?;
    Ok(chain
        .iter()
        .filter(|(_, e)| !e.is_empty())
        .map(|(_, e)| e.name().to_string())
        .collect())
}

fn chain_of(file: &mut File, ext: &Partition) -> Result<Vec<(i64, Ebr)>> {
    walk_chain(file, ext.start, ext.start, ext.end())
}

/// Ensures the head EBR of a freshly created (or zeroed) extended partition
/// is a well-formed empty terminator.
fn ensure_head_ebr(file: &mut File, ext: &Partition) -> Result<()> {
    let head = read_ebr(file, ext.start)?;
    if head.is_empty() && head.next != EBR_END && head.next < ext.start {
        write_ebr(file, ext.start, &Ebr::default())?;
    }
    Ok(())
}

/// Creates a primary, extended or logical partition on the disk at `path`.
pub fn create_partition(path: &Path, spec: &PartitionSpec) -> Result<()> {
    validate_name(&spec.name)?;
    if spec.size <= 0 {
        return Err(PartError::BadParam(
            "partition size must be greater than zero".into(),
        ));
    }

    let (mut file, mut mbr) = open_disk(path)?;

    // Duplicate names are rejected across the MBR table and the EBR chain.
    if mbr.find_by_name(&spec.name).is_some() {
        return Err(PartError::DuplicateName(spec.name.clone()));
    }
    if let Some(ext) = mbr.extended().copied() {
        ensure_head_ebr(&mut file, &ext)?;
        if logical_names(&mut file, &ext)?.iter().any(|n| n == &spec.name) {
            return Err(PartError::DuplicateName(spec.name.clone()));
        }
    }

    match spec.kind {
        PartitionKind::Logical => {
            let ext = mbr.extended().copied().ok_or(PartError::NoExtended)?;
            create_logical(&mut file, &ext, spec)
        }
        kind => {
            let primaries = mbr.primary_count();
            let extendeds = mbr.extended_count();
            if kind == PartitionKind::Primary
                && (primaries >= 4 || (primaries >= 3 && extendeds >= 1))
            {
                return Err(PartError::SlotFull);
            }
            if kind == PartitionKind::Extended && extendeds >= 1 {
                return Err(PartError::ExtendedExists);
            }
            let slot = mbr.free_slot().ok_or(PartError::SlotFull)?;

            let start = find_gap(spec.fit, &mbr.occupied(), spec.size, 0, mbr.size)
                .ok_or(PartError::NoSpace(spec.size))?;

            mbr.partitions[slot] = Partition::new(&spec.name, start, spec.size, kind, spec.fit);
            write_mbr(&mut file, &mbr)?;

            if kind == PartitionKind::Extended {
                write_ebr(&mut file, start, &Ebr::default())?;
            }
            log::debug!("created {:?} partition '{}' at {}", kind, spec.name, start);
            Ok(())
        }
    }
}

fn create_logical(file: &mut File, ext: &Partition, spec: &PartitionSpec) -> Result<()> {
    let chain = chain_of(file, ext)?;

    let occupied: Vec<(i64, i64)> = chain
        .iter()
        .filter(|(_, e)| !e.is_empty())
        .map(|(offset, e)| (*offset, e.end()))
        .collect();

    let need = EBR_SIZE + spec.size;
    let pos = find_gap(spec.fit, &occupied, need, ext.start, ext.end())
        .ok_or(PartError::NoSpace(spec.size))?;

    let head = chain[0].1;
    if pos == ext.start && head.is_empty() {
        // First logical partition: fill the standing head EBR in place.
        let mut filled = head;
        filled.start = pos + EBR_SIZE;
        filled.size = spec.size;
        filled.fit = spec.fit.as_byte();
        filled.name = FixedStr::new_truncate(&spec.name);
        filled.mount = 0;
        write_ebr(file, ext.start, &filled)?;
        return Ok(());
    }

    // Thread a new EBR into the chain, keeping offsets in ascending order.
    let (pred_offset, pred) = chain
        .iter()
        .filter(|(offset, _)| *offset < pos)
        .max_by_key(|(offset, _)| *offset)
        .copied()
        .ok_or(PartError::NoSpace(spec.size))?;

    let node = Ebr {
        start: pos + EBR_SIZE,
        size: spec.size,
        next: pred.next,
        name: FixedStr::new_truncate(&spec.name),
        ..Ebr::default()
    };
    write_ebr(file, pos, &node)?;

    let mut pred = pred;
    pred.next = pos;
    write_ebr(file, pred_offset, &pred)?;
    log::debug!("created logical partition '{}' at {}", spec.name, pos);
    Ok(())
}

/// Deletes the named partition. Deleting an extended partition discards its
/// whole logical chain; `Full` zeroes the affected byte ranges.
pub fn delete_partition(path: &Path, name: &str, mode: DeleteMode) -> Result<()> {
    let (mut file, mut mbr) = open_disk(path)?;

    if let Some(index) = mbr.find_by_name(name) {
        let part = mbr.partitions[index];
        if mode == DeleteMode::Full {
            zero_range(&mut file, part.start as u64, part.size as u64)?;
        }
        mbr.partitions[index].clear();
        write_mbr(&mut file, &mbr)?;
        log::debug!("deleted partition '{name}' ({mode:?})");
        return Ok(());
    }

    // Not in the MBR table: try the logical chain.
    let ext = mbr.extended().copied().ok_or_else(|| PartError::NotFound(name.to_string()))?;
    delete_logical(&mut file, &ext, name, mode)
}

fn delete_logical(file: &mut File, ext: &Partition, name: &str, mode: DeleteMode) -> Result<()> {
    let chain = chain_of(file, ext)?;
    let position = chain
        .iter()
        .position(|(_, e)| !e.is_empty() && e.name.matches(name))
        .ok_or_else(|| PartError::NotFound(name.to_string()))?;

    let (offset, node) = chain[position];
    if mode == DeleteMode::Full {
        zero_range(file, node.start as u64, node.size as u64)?;
    }

    if offset == ext.start {
        // Head node: empty the payload but keep the link so the tail of the
        // chain stays reachable.
        let mut head = node;
        head.clear_payload();
        write_ebr(file, offset, &head)?;
    } else {
        let (pred_offset, mut pred) = chain[position - 1];
        pred.next = node.next;
        write_ebr(file, pred_offset, &pred)?;
    }
    log::debug!("deleted logical partition '{name}' ({mode:?})");
    Ok(())
}

/// Grows (`delta > 0`) or shrinks (`delta < 0`) an MBR partition in place.
/// Growth requires contiguous free bytes up to the next occupied interval;
/// no data is migrated.
pub fn resize_partition(path: &Path, name: &str, delta: i64) -> Result<()> {
    let (mut file, mut mbr) = open_disk(path)?;
    let index = mbr
        .find_by_name(name)
        .ok_or_else(|| PartError::NotFound(name.to_string()))?;

    let part = mbr.partitions[index];
    let new_size = part.size + delta;
    if new_size <= 0 {
        return Err(PartError::BadResize(name.to_string()));
    }

    if delta > 0 {
        let end = part.end();
        let next_start = mbr
            .partitions
            .iter()
            .filter(|p| !p.is_empty() && p.start > part.start)
            .map(|p| p.start)
            .min()
            .unwrap_or(mbr.size);
        if delta > next_start - end {
            return Err(PartError::NoSpace(delta));
        }
    }

    mbr.partitions[index].size = new_size;
    write_mbr(&mut file, &mbr)?;
    Ok(())
}

pub(crate) fn list_from_mbr(mbr: &Mbr) -> Vec<PartitionInfo> {
    let mut rows: Vec<PartitionInfo> = mbr
        .partitions
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| PartitionInfo {
            name: p.name().to_string(),
            kind: p.kind().unwrap_or(PartitionKind::Primary),
            start: p.start,
            size: p.size,
            mounted: p.is_mounted(),
            id: p.id.as_str().to_string(),
            fit: Fit::from_byte(p.fit),
        })
        .collect();
    rows.sort_by_key(|p| p.start);
    rows
}

pub(crate) fn logicals_from_chain(file: &mut File, ext: &Partition) -> Result<Vec<LogicalInfo>> {
    let chain = chain_of(file, ext)?;
    Ok(chain
        .iter()
        .filter(|(_, e)| !e.is_empty())
        .map(|(offset, e)| LogicalInfo {
            name: e.name().to_string(),
            start: e.start,
            size: e.size,
            mounted: e.mount == 1,
            ebr_offset: *offset,
            next: e.next,
            fit: Fit::from_byte(e.fit),
        })
        .collect())
}

/// Lists the non-empty MBR partitions of a disk, sorted by start offset.
pub fn list_partitions(path: &Path) -> Result<Vec<PartitionInfo>> {
    let (_file, mbr) = open_disk(path)?;
    Ok(list_from_mbr(&mbr))
}

/// Lists the logical partitions of a disk (empty when no extended exists).
pub fn logical_partitions(path: &Path) -> Result<Vec<LogicalInfo>> {
    let (mut file, mbr) = open_disk(path)?;
    match mbr.extended() {
        Some(ext) => {
            let ext = *ext;
            logicals_from_chain(&mut file, &ext)
        }
        None => Ok(Vec::new()),
    }
}

/// A partition located by name, MBR entry or logical.
#[derive(Debug, Clone)]
pub struct LocatedPartition {
    pub name: String,
    pub start: i64,
    pub size: i64,
    pub kind: PartitionKind,
    /// MBR slot index for primaries/extendeds.
    pub mbr_index: Option<usize>,
    /// EBR offset for logicals.
    pub ebr_offset: Option<i64>,
}

/// Finds a partition by name across the MBR table and the logical chain.
pub fn locate_partition(path: &Path, name: &str) -> Result<LocatedPartition> {
    let (mut file, mbr) = open_disk(path)?;

    if let Some(index) = mbr.find_by_name(name) {
        let p = &mbr.partitions[index];
        return Ok(LocatedPartition {
            name: p.name().to_string(),
            start: p.start,
            size: p.size,
            kind: p.kind().unwrap_or(PartitionKind::Primary),
            mbr_index: Some(index),
            ebr_offset: None,
        });
    }

    if let Some(ext) = mbr.extended().copied() {
        for (offset, ebr) in chain_of(&mut file, &ext)? {
            if !ebr.is_empty() && ebr.name.matches(name) {
                return Ok(LocatedPartition {
                    name: ebr.name().to_string(),
                    start: ebr.start,
                    size: ebr.size,
                    kind: PartitionKind::Logical,
                    mbr_index: None,
                    ebr_offset: Some(offset),
                });
            }
        }
    }
    Err(PartError::NotFound(name.to_string()))
}
