//! Table binary format constants and footer read/write helpers.
//!
//! A table file is a data region of prefix-compressed entries, followed by an
//! index region, followed by a 12-byte footer:
//!
//! ```text
//! [root: u64 LE][magic: u32 LE = 0x4150_5431]
//! ```
//!
//! `root` is the byte offset at which the index region begins; reaching it
//! during a sequential scan signals end-of-table. The first byte of the index
//! region selects one of three index structures.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result as IoResult, Seek, SeekFrom, Write};

/// Magic number identifying table v1 files (ASCII "APT1").
pub const TABLE_MAGIC: u32 = 0x4150_5431;

/// Size of the footer in bytes: 8 (`root`) + 4 (`magic`).
pub const FOOTER_BYTES: u64 = 8 + 4;

/// Keys longer than this are rejected by the writer, so the cursor may assume
/// they never occur.
pub const MAX_KEY_LEN: usize = 255;

/// Width of the zero-padded prefixes stored in a binary-chop index. Must be
/// bit-exact with the writer.
pub const BINARY_CHOP_KEY_SIZE: usize = 4;

/// Index type tag: array of per-first-byte pointers.
pub const INDEX_ARRAY: u8 = 0x00;

/// Index type tag: sorted fixed-width prefixes searched by binary chop.
pub const INDEX_BINARY_CHOP: u8 = 0x01;

/// Index type tag: prefix-compressed skiplist walked sequentially.
pub const INDEX_SKIPLIST: u8 = 0x02;

/// Returns the byte offset where the footer starts: `filesize - 12`.
///
/// Uses [`u64::saturating_sub`] so files smaller than 12 bytes return 0
/// rather than underflowing.
pub fn footer_pos(filesize: u64) -> u64 {
    filesize.saturating_sub(FOOTER_BYTES)
}

/// Writes the table footer (`root` + `magic`) to `w`.
pub fn write_footer<W: Write>(w: &mut W, root: u64) -> IoResult<()> {
    w.write_u64::<LittleEndian>(root)?;
    w.write_u32::<LittleEndian>(TABLE_MAGIC)?;
    Ok(())
}

/// Reads the table footer from `r`, returning `(root, magic)`.
///
/// The reader is seeked to the end to determine file size, then to the
/// footer position. After this call the stream is at the end of the file.
pub fn read_footer<R: Read + Seek>(r: &mut R) -> IoResult<(u64, u32)> {
    let filesize = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(footer_pos(filesize)))?;
    let root = r.read_u64::<LittleEndian>()?;
    let magic = r.read_u32::<LittleEndian>()?;
    Ok((root, magic))
}
