//! Size units and the First/Best/Worst fit gap search.

use crate::PartError;

/// Size unit accepted by the disk and partition commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bytes,
    Kibi,
    Mebi,
}

impl Unit {
    pub fn parse(s: &str) -> Result<Self, PartError> {
        match s.to_ascii_uppercase().as_str() {
            "B" => Ok(Self::Bytes),
            "K" => Ok(Self::Kibi),
            "M" => Ok(Self::Mebi),
            other => Err(PartError::BadParam(format!(
                "unknown unit '{other}', expected B, K or M"
            ))),
        }
    }

    pub fn bytes(self, count: i64) -> i64 {
        match self {
            Self::Bytes => count,
            Self::Kibi => count * 1024,
            Self::Mebi => count * 1024 * 1024,
        }
    }
}

/// Placement algorithm for a contiguous allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    First,
    Best,
    Worst,
}

impl Fit {
    pub fn parse(s: &str) -> Result<Self, PartError> {
        match s.to_ascii_uppercase().as_str() {
            "FF" | "F" => Ok(Self::First),
            "BF" | "B" => Ok(Self::Best),
            "WF" | "W" => Ok(Self::Worst),
            other => Err(PartError::BadParam(format!(
                "unknown fit '{other}', expected FF, BF or WF"
            ))),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::First => b'F',
            Self::Best => b'B',
            Self::Worst => b'W',
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'F' => Some(Self::First),
            b'B' => Some(Self::Best),
            b'W' => Some(Self::Worst),
            _ => None,
        }
    }
}

/// A free gap inside the managed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: i64,
    pub len: i64,
}

/// Computes the free gaps of `[region_start, region_end)` left over by the
/// occupied intervals, in ascending start order.
pub fn free_gaps(occupied: &[(i64, i64)], region_start: i64, region_end: i64) -> Vec<Gap> {
    let mut spans: Vec<(i64, i64)> = occupied.to_vec();
    spans.sort_unstable_by_key(|s| s.0);

    let mut gaps = Vec::new();
    let mut cursor = region_start;
    for &(start, end) in &spans {
        if start > cursor {
            gaps.push(Gap {
                start: cursor,
                len: start - cursor,
            });
        }
        cursor = cursor.max(end);
    }
    if region_end > cursor {
        gaps.push(Gap {
            start: cursor,
            len: region_end - cursor,
        });
    }
    gaps
}

/// Picks the start offset for a `need`-byte allocation, or `None` when no
/// gap is large enough. Ties between equally-sized gaps go to the lowest
/// start address.
pub fn find_gap(
    fit: Fit,
    occupied: &[(i64, i64)],
    need: i64,
    region_start: i64,
    region_end: i64,
) -> Option<i64> {
    let gaps = free_gaps(occupied, region_start, region_end);
    let candidates = gaps.iter().filter(|g| g.len >= need);

    let chosen = match fit {
        Fit::First => candidates.min_by_key(|g| g.start),
        Fit::Best => candidates.min_by_key(|g| (g.len, g.start)),
        Fit::Worst => candidates.max_by_key(|g| (g.len, -g.start)),
    };
    let chosen = chosen?;
    log::debug!(
        "{:?} fit: {} bytes at {} (gap {} bytes)",
        fit,
        need,
        chosen.start,
        chosen.len
    );
    Some(chosen.start)
}
