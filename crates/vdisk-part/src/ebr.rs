//! Extended boot records: the linked list of logical partitions that lives
//! inside an extended partition.

use std::fs::File;

use vdisk_common::io::{read_record_at, write_record_at};
use vdisk_common::str::FixedStr;

use crate::{PartError, Result};

/// Bytes reserved for every EBR header. The logical partition's data starts
/// right after its EBR, so `ebr.start == ebr_offset + EBR_SIZE`.
pub const EBR_SIZE: i64 = 1024;

/// Chain terminator for the `next` field.
pub const EBR_END: i64 = -1;

/// One extended boot record (48 bytes on disk, within a 1024-byte region).
///
/// An EBR is empty iff `size == 0`. The head EBR always sits at the start of
/// the extended partition; an empty head with `next == EBR_END` means no
/// logical partitions exist yet.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Ebr {
    /// Start of the partition data (the EBR itself is at `start - EBR_SIZE`).
    pub start: i64,
    pub size: i64,
    /// Absolute disk offset of the next EBR, or [`EBR_END`].
    pub next: i64,
    pub name: FixedStr<16>,
    pub mount: u8,
    pub fit: u8,
    pub(crate) _pad: [u8; 6],
}

unsafe impl bytemuck::Zeroable for Ebr {}
unsafe impl bytemuck::NoUninit for Ebr {}
unsafe impl bytemuck::AnyBitPattern for Ebr {}

impl Default for Ebr {
    fn default() -> Self {
        Self {
            start: 0,
            size: 0,
            next: EBR_END,
            name: FixedStr::default(),
            mount: 0,
            fit: 0,
            _pad: [0; 6],
        }
    }
}

impl Ebr {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn end(&self) -> i64 {
        self.start + self.size
    }

    pub fn has_next(&self) -> bool {
        self.next != EBR_END
    }

    /// Empties the partition payload. The `next` link is preserved so the
    /// rest of the chain stays reachable when the head is cleared.
    pub fn clear_payload(&mut self) {
        self.start = 0;
        self.size = 0;
        self.mount = 0;
        self.fit = 0;
        self.name.clear();
    }
}

pub fn read_ebr(file: &mut File, offset: i64) -> Result<Ebr> {
    Ok(read_record_at(file, offset as u64)?)
}

pub fn write_ebr(file: &mut File, offset: i64, ebr: &Ebr) -> Result<()> {
    write_record_at(file, offset as u64, ebr)?;
    file.sync_all()?;
    Ok(())
}

/// Walks the EBR chain from `head_offset`, yielding `(offset, ebr)` pairs.
///
/// Fails with [`PartError::ChainCycle`] when an offset repeats and with
/// `BadParam` when a link leaves `[region_start, region_end)`.
pub fn walk_chain(
    file: &mut File,
    head_offset: i64,
    region_start: i64,
    region_end: i64,
) -> Result<Vec<(i64, Ebr)>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut offset = head_offset;

    loop {
        if offset < region_start || offset >= region_end {
            return Err(PartError::BadParam(format!(
                "EBR offset {offset} escapes the extended partition"
            )));
        }
        if !seen.insert(offset) {
            return Err(PartError::ChainCycle(offset));
        }
        let ebr = read_ebr(file, offset)?;
        let next = ebr.next;
        out.push((offset, ebr));
        if next == EBR_END {
            break;
        }
        offset = next;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::size_of;
    use std::io::Write;

    #[test]
    fn on_disk_size() {
        assert_eq!(size_of::<Ebr>(), 48);
        assert!((size_of::<Ebr>() as i64) <= EBR_SIZE);
    }

    fn scratch_disk(len: u64) -> (tempfile::NamedTempFile, File) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(tmp.path())
            .unwrap();
        file.set_len(len).unwrap();
        file.flush().unwrap();
        (tmp, file)
    }

    #[test]
    fn chain_walk_visits_every_node_once() {
        let (_tmp, mut file) = scratch_disk(64 * 1024);
        let head = Ebr {
            start: 1024,
            size: 512,
            next: 8192,
            name: FixedStr::new_truncate("l1"),
            ..Ebr::default()
        };
        let tail = Ebr {
            start: 8192 + EBR_SIZE,
            size: 512,
            next: EBR_END,
            name: FixedStr::new_truncate("l2"),
            ..Ebr::default()
        };
        write_ebr(&mut file, 0, &head).unwrap();
        write_ebr(&mut file, 8192, &tail).unwrap();

        let chain = walk_chain(&mut file, 0, 0, 64 * 1024).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].1.name(), "l1");
        assert_eq!(chain[1].1.name(), "l2");
    }

    #[test]
    fn chain_cycle_is_detected() {
        let (_tmp, mut file) = scratch_disk(64 * 1024);
        let a = Ebr {
            start: 1024,
            size: 512,
            next: 8192,
            ..Ebr::default()
        };
        let b = Ebr {
            start: 8192 + EBR_SIZE,
            size: 512,
            next: 0,
            ..Ebr::default()
        };
        write_ebr(&mut file, 0, &a).unwrap();
        write_ebr(&mut file, 8192, &b).unwrap();

        match walk_chain(&mut file, 0, 0, 64 * 1024) {
            Err(PartError::ChainCycle(offset)) => assert_eq!(offset, 0),
            other => panic!("expected ChainCycle, got {other:?}"),
        }
    }

    #[test]
    fn clearing_head_keeps_the_link() {
        let mut head = Ebr {
            start: 1024,
            size: 512,
            next: 4096,
            name: FixedStr::new_truncate("l1"),
            mount: 1,
            ..Ebr::default()
        };
        head.clear_payload();
        assert!(head.is_empty());
        assert_eq!(head.next, 4096);
    }
}
