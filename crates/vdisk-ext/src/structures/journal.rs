//! Journal records for EXT3 filesystems.

use vdisk_common::str::FixedStr;

/// Maximum number of entries the journal holds. Appends past this capacity
/// are silently dropped.
pub const JOURNAL_CAPACITY: usize = 64;

pub const JOURNAL_OP_LEN: usize = 10;
pub const JOURNAL_PATH_LEN: usize = 32;
pub const JOURNAL_CONTENT_LEN: usize = 64;

/// One journaled operation (120 bytes on disk). An entry is valid iff
/// `date != 0`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct JournalEntry {
    pub date: f64,
    pub op: FixedStr<JOURNAL_OP_LEN>,
    pub path: FixedStr<JOURNAL_PATH_LEN>,
    pub content: FixedStr<JOURNAL_CONTENT_LEN>,
    pub(crate) _pad: [u8; 6],
}

unsafe impl bytemuck::Zeroable for JournalEntry {}
unsafe impl bytemuck::NoUninit for JournalEntry {}
unsafe impl bytemuck::AnyBitPattern for JournalEntry {}

pub const JOURNAL_ENTRY_SIZE: i64 = core::mem::size_of::<JournalEntry>() as i64;

/// Bytes of the whole journal region: a count header (i32 + 4 bytes pad)
/// followed by the fixed entry array.
pub const JOURNAL_REGION_SIZE: i64 = 8 + JOURNAL_CAPACITY as i64 * JOURNAL_ENTRY_SIZE;

impl JournalEntry {
    /// Builds an entry stamped with the current time. Oversized `path` or
    /// `content` are truncated to their fixed field widths.
    pub fn new(op: &str, path: &str, content: &str) -> Self {
        Self {
            date: vdisk_common::time::unix_now_f64(),
            op: FixedStr::new_truncate(op),
            path: FixedStr::new_truncate(path),
            content: FixedStr::new_truncate(content),
            _pad: [0; 6],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.date != 0.0
    }

    pub fn op(&self) -> &str {
        self.op.as_str()
    }

    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    /// Whether this entry marks a (re)format of the partition.
    pub fn is_format_marker(&self) -> bool {
        matches!(self.op(), "mkfs" | "format")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::size_of;

    #[test]
    fn on_disk_sizes() {
        assert_eq!(size_of::<JournalEntry>(), 120);
        assert_eq!(JOURNAL_REGION_SIZE, 8 + 64 * 120);
    }

    #[test]
    fn zeroed_entries_are_invalid() {
        let entry: JournalEntry = bytemuck::Zeroable::zeroed();
        assert!(!entry.is_valid());
        assert!(JournalEntry::new("mkdir", "/a", "").is_valid());
    }

    #[test]
    fn oversized_fields_truncate() {
        let long_path = "/".repeat(50);
        let entry = JournalEntry::new("mkfile", &long_path, "abc");
        assert_eq!(entry.path().len(), JOURNAL_PATH_LEN);
        assert_eq!(entry.content(), "abc");
    }

    #[test]
    fn format_markers() {
        assert!(JournalEntry::new("mkfs", "/", "").is_format_marker());
        assert!(JournalEntry::new("format", "/", "").is_format_marker());
        assert!(!JournalEntry::new("mkdir", "/", "").is_format_marker());
    }
}
