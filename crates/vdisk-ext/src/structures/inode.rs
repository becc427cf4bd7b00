//! Inodes and the UGO permission triplet.

use crate::{FsError, Result};

pub const INODE_SIZE: i64 = 128;

/// Number of meaningful direct block pointers. `block[12..15]` exist on
/// disk but are never assigned (no indirect blocks).
pub const DIRECT_BLOCKS: usize = 12;

pub const BLOCK_POINTERS: usize = 15;

/// Marker for an unassigned block pointer.
pub const FREE_PTR: i32 = -1;

bitflags::bitflags! {
    /// One rwx access mask, applied to a single permission digit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        const READ = 4;
        const WRITE = 2;
        const EXEC = 1;
    }
}

/// Inode kind as stored in the `kind` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    Regular,
}

impl FileKind {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Directory => 0,
            Self::Regular => 1,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Directory),
            1 => Some(Self::Regular),
            _ => None,
        }
    }
}

/// Three octal permission digits: owner, group, other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Perm(pub [u8; 3]);

impl Perm {
    /// Decodes a decimal-written octal triple (`755` → `[7, 5, 5]`).
    /// Values outside `[0, 777]` or with digits above 7 are rejected.
    pub fn from_octal(value: i32) -> Result<Self> {
        let digits = [
            ((value / 100) % 10) as u8,
            ((value / 10) % 10) as u8,
            (value % 10) as u8,
        ];
        if !(0..=777).contains(&value) || digits.iter().any(|d| *d > 7) {
            return Err(FsError::BadParam(format!(
                "invalid permission value '{value}'"
            )));
        }
        Ok(Self(digits))
    }

    pub fn to_octal(self) -> i32 {
        self.0[0] as i32 * 100 + self.0[1] as i32 * 10 + self.0[2] as i32
    }

    pub fn owner(self) -> u8 {
        self.0[0]
    }

    pub fn group(self) -> u8 {
        self.0[1]
    }

    pub fn other(self) -> u8 {
        self.0[2]
    }

    /// Whether `digit` grants every bit of `access`.
    pub fn digit_allows(digit: u8, access: Access) -> bool {
        digit & access.bits() == access.bits()
    }
}

/// One file or directory (128 bytes on disk).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Inode {
    pub atime: f64,
    pub ctime: f64,
    pub mtime: f64,
    pub uid: i32,
    pub gid: i32,
    pub size: i32,
    pub block: [i32; BLOCK_POINTERS],
    pub kind: u8,
    pub perm: [u8; 3],
    pub(crate) reserved: [u8; 28],
}

unsafe impl bytemuck::Zeroable for Inode {}
unsafe impl bytemuck::NoUninit for Inode {}
unsafe impl bytemuck::AnyBitPattern for Inode {}

impl Inode {
    pub fn new(kind: FileKind, uid: i32, gid: i32, size: i32, perm: Perm) -> Self {
        let now = vdisk_common::time::unix_now_f64();
        Self {
            atime: now,
            ctime: now,
            mtime: now,
            uid,
            gid,
            size,
            block: [FREE_PTR; BLOCK_POINTERS],
            kind: kind.as_byte(),
            perm: perm.0,
            reserved: [0; 28],
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory.as_byte()
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::Regular.as_byte()
    }

    pub fn perm(&self) -> Perm {
        Perm(self.perm)
    }

    /// The assigned direct block pointers, in order.
    pub fn direct_blocks(&self) -> impl Iterator<Item = i32> + '_ {
        self.block[..DIRECT_BLOCKS]
            .iter()
            .copied()
            .take_while(|b| *b != FREE_PTR)
    }

    pub fn touch_modified(&mut self) {
        let now = vdisk_common::time::unix_now_f64();
        self.mtime = now;
        self.atime = now;
    }

    pub fn touch_accessed(&mut self) {
        self.atime = vdisk_common::time::unix_now_f64();
    }
}
