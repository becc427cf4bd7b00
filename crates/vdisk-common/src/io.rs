//! Positioned record I/O over host files.
//!
//! Every on-disk structure in vdisk is a bytemuck `Pod` type whose in-memory
//! layout is the on-disk layout, so reading and writing a record is a seek
//! followed by an exact-size transfer of `size_of::<T>()` bytes.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Reads one `T` at the given absolute byte offset.
pub fn read_record_at<T: bytemuck::AnyBitPattern>(file: &mut File, offset: u64) -> io::Result<T> {
    let mut buf = vec![0u8; core::mem::size_of::<T>()];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(bytemuck::pod_read_unaligned(&buf))
}

/// Writes one `T` at the given absolute byte offset.
pub fn write_record_at<T: bytemuck::NoUninit>(
    file: &mut File,
    offset: u64,
    record: &T,
) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytemuck::bytes_of(record))
}

/// Reads `len` raw bytes at the given absolute byte offset.
pub fn read_bytes_at(file: &mut File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes raw bytes at the given absolute byte offset.
pub fn write_bytes_at(file: &mut File, offset: u64, bytes: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)
}

/// Overwrites `[offset, offset + len)` with zeros, in bounded chunks so a
/// multi-GiB FULL delete does not allocate the whole range at once.
pub fn zero_range(file: &mut File, offset: u64, len: u64) -> io::Result<()> {
    const CHUNK: u64 = 64 * 1024;
    let zeros = [0u8; CHUNK as usize];
    file.seek(SeekFrom::Start(offset))?;
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(CHUNK);
        file.write_all(&zeros[..n as usize])?;
        remaining -= n;
    }
    Ok(())
}
