//! Master boot record and partition table entries.

use vdisk_common::str::FixedStr;

use crate::fit::Fit;
use crate::manager::PartitionKind;

/// Bytes reserved at the start of every disk for the MBR. The serialized
/// [`Mbr`] record is smaller; the remainder of the region is zero.
pub const MBR_SIZE: i64 = 1024;

/// Partition names are NUL-terminated with at most 15 content bytes.
pub const PARTITION_NAME_LEN: usize = 15;

/// One entry of the 4-slot MBR partition table (48 bytes on disk).
///
/// A slot is empty iff `size == 0`. `status` tracks the mount state only
/// (0 = unmounted, 1 = mounted); `correlative` and `id` are assigned while
/// mounted.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Partition {
    pub start: i64,
    pub size: i64,
    pub correlative: i64,
    pub name: FixedStr<16>,
    pub id: FixedStr<4>,
    pub status: u8,
    pub kind: u8,
    pub fit: u8,
    _pad: [u8; 1],
}

unsafe impl bytemuck::Zeroable for Partition {}
unsafe impl bytemuck::NoUninit for Partition {}
unsafe impl bytemuck::AnyBitPattern for Partition {}

impl Default for Partition {
    fn default() -> Self {
        Self {
            start: 0,
            size: 0,
            correlative: -1,
            name: FixedStr::default(),
            id: FixedStr::default(),
            status: 0,
            kind: 0,
            fit: 0,
            _pad: [0; 1],
        }
    }
}

impl Partition {
    pub fn new(name: &str, start: i64, size: i64, kind: PartitionKind, fit: Fit) -> Self {
        Self {
            start,
            size,
            name: FixedStr::new_truncate(name),
            kind: kind.as_byte(),
            fit: fit.as_byte(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn end(&self) -> i64 {
        self.start + self.size
    }

    pub fn kind(&self) -> Option<PartitionKind> {
        PartitionKind::from_byte(self.kind)
    }

    pub fn is_extended(&self) -> bool {
        self.kind == b'E'
    }

    pub fn is_mounted(&self) -> bool {
        self.status == 1
    }

    pub fn mount(&mut self, number: i64, id: &str) {
        self.status = 1;
        self.correlative = number;
        self.id = FixedStr::new_truncate(id);
    }

    pub fn unmount(&mut self) {
        self.status = 0;
        self.correlative = -1;
        self.id.clear();
    }

    /// Resets the slot to the empty state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The master boot record (224 bytes on disk, within a 1024-byte region).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Mbr {
    pub size: i64,
    pub created: i64,
    pub signature: i64,
    pub partitions: [Partition; 4],
    pub fit: u8,
    _pad: [u8; 7],
}

unsafe impl bytemuck::Zeroable for Mbr {}
unsafe impl bytemuck::NoUninit for Mbr {}
unsafe impl bytemuck::AnyBitPattern for Mbr {}

impl Mbr {
    /// Builds a fresh MBR for a disk of `size` bytes with a random,
    /// non-zero identification signature.
    pub fn new(size: i64, fit: Fit) -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let signature = rng.gen_range(1..i64::MAX);
        Self {
            size,
            created: vdisk_common::time::unix_now(),
            signature,
            partitions: [Partition::default(); 4],
            fit: fit.as_byte(),
            _pad: [0; 7],
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.partitions
            .iter()
            .position(|p| !p.is_empty() && p.name.matches(name))
    }

    pub fn extended(&self) -> Option<&Partition> {
        self.partitions
            .iter()
            .find(|p| !p.is_empty() && p.is_extended())
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.partitions.iter().position(|p| p.is_empty())
    }

    pub fn primary_count(&self) -> usize {
        self.partitions
            .iter()
            .filter(|p| !p.is_empty() && p.kind == b'P')
            .count()
    }

    pub fn extended_count(&self) -> usize {
        self.partitions
            .iter()
            .filter(|p| !p.is_empty() && p.is_extended())
            .count()
    }

    /// Occupied byte intervals of the disk, the MBR region included.
    pub fn occupied(&self) -> Vec<(i64, i64)> {
        let mut spans = vec![(0, MBR_SIZE)];
        for p in self.partitions.iter().filter(|p| !p.is_empty()) {
            spans.push((p.start, p.end()));
        }
        spans
    }
}
