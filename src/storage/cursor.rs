//! Cursor over an immutable sorted table file.
//!
//! The cursor decodes prefix-compressed keys sequentially and uses the
//! table's index region to jump close to a sought key. Values are read
//! lazily: after positioning, the value bytes are still on disk until
//! [`read_tag`] is called, and are skipped wholesale if the cursor moves on
//! without reading them.
//!
//! [`read_tag`]: TableCursor::read_tag

use std::cmp::Ordering;
use std::io;
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use tracing::trace;

use crate::error::{ApiaryError, Result};
use crate::storage::byte_file::ByteFile;
use crate::storage::compression::CompressionStream;
use crate::storage::format::{
    footer_pos, BINARY_CHOP_KEY_SIZE, INDEX_ARRAY, INDEX_BINARY_CHOP, INDEX_SKIPLIST, MAX_KEY_LEN,
};
use crate::storage::varint::{unpack_uint, MAX_VARINT_BYTES};

/// Where an index lookup left the cursor.
enum IndexSeek {
    /// Exact match: the cursor is positioned on the sought entry.
    Found,
    /// The key is beyond every entry in the table.
    OffTheEnd,
    /// Positioned at a jump target; a forward scan finishes the job.
    Scan,
}

/// A cursor over a single table file.
///
/// Between operations the file position is either at the start of the next
/// entry's header, or inside the current entry's value with `val_size`
/// holding the bytes still unread.
pub struct TableCursor {
    file: ByteFile,
    /// Offset where the data region ends and the index region begins.
    root: u64,
    /// Offset where the index region ends (the footer starts here).
    index_end: u64,
    is_at_end: bool,
    /// Key of the current entry; also the prefix base for decoding the next.
    current_key: Vec<u8>,
    /// Bytes of the current value still unread from the file.
    val_size: u64,
    current_compressed: bool,
    current_tag: Vec<u8>,
    comp_stream: CompressionStream,
}

impl TableCursor {
    pub(crate) fn open(path: &Path, root: u64) -> Result<Self> {
        let file = ByteFile::open(path)?;
        let index_end = footer_pos(file.len());
        Ok(Self {
            file,
            root,
            index_end,
            is_at_end: false,
            current_key: Vec::new(),
            val_size: 0,
            current_compressed: false,
            current_tag: Vec::new(),
            comp_stream: CompressionStream::new(),
        })
    }

    /// Whether the cursor has run off the end of the table.
    pub fn is_at_end(&self) -> bool {
        self.is_at_end
    }

    /// Key of the current entry. Meaningful only while positioned on an
    /// entry; invalidated by the next mutating call.
    pub fn current_key(&self) -> &[u8] {
        &self.current_key
    }

    /// Value bytes of the current entry, as last produced by [`read_tag`].
    ///
    /// [`read_tag`]: TableCursor::read_tag
    pub fn current_tag(&self) -> &[u8] {
        &self.current_tag
    }

    /// Reposition at the start of the data region, before the first entry.
    pub fn rewind(&mut self) -> Result<()> {
        self.file.set_pos(0)?;
        self.current_key.clear();
        self.is_at_end = false;
        self.val_size = 0;
        Ok(())
    }

    /// Advance to the next entry. Returns `false` at the end of the table.
    pub fn next(&mut self) -> Result<bool> {
        if self.is_at_end {
            debug_assert!(false, "next() called on a cursor already at end");
            return Ok(false);
        }

        if self.val_size > 0 {
            // Skip value data we've not looked at.
            let pending = self.val_size;
            self.file.skip(pending)?;
            self.val_size = 0;
        }

        if self.file.pos() >= self.root {
            if self.file.pos() > self.root {
                return Err(ApiaryError::corrupt("data entry overruns the index region"));
            }
            self.is_at_end = true;
            return Ok(false);
        }

        let first = self.read_data_byte("key header")?;
        let (reuse, tail_len) = if self.current_key.is_empty() {
            // A fresh prefix chain: a single length byte, no reuse byte.
            (0usize, first as usize)
        } else {
            (first as usize, self.read_data_byte("key length")? as usize)
        };
        if reuse > self.current_key.len() {
            return Err(ApiaryError::corrupt("key reuse exceeds previous key length"));
        }

        let mut tail = [0u8; MAX_KEY_LEN];
        self.read_data_exact(&mut tail[..tail_len], "key bytes")?;
        self.current_key.truncate(reuse);
        self.current_key.extend_from_slice(&tail[..tail_len]);

        self.decode_val_header()?;
        Ok(true)
    }

    /// Read the value header of the entry at the current file position.
    fn decode_val_header(&mut self) -> Result<()> {
        let header = self.read_file_varint("value header")?;
        self.current_compressed = header & 1 != 0;
        self.val_size = header >> 1;
        if self.val_size == 0 {
            self.current_tag.clear();
        }
        self.is_at_end = false;
        Ok(())
    }

    /// Read the current entry's value into the tag buffer.
    ///
    /// With `keep_compressed` false, a compressed value is decompressed in
    /// place. Returns whether the tag is still compressed afterwards.
    pub fn read_tag(&mut self, keep_compressed: bool) -> Result<bool> {
        if self.val_size > 0 {
            self.current_tag.resize(self.val_size as usize, 0);
            io::Read::read_exact(&mut self.file, &mut self.current_tag)?;
            self.val_size = 0;
        }
        if !keep_compressed && self.current_compressed {
            self.comp_stream.decompress_start();
            let mut plain = Vec::with_capacity(self.current_tag.len() * 4);
            let done = self
                .comp_stream
                .decompress_chunk(&self.current_tag, &mut plain)?;
            if !done {
                return Err(ApiaryError::corrupt("compressed value truncated"));
            }
            std::mem::swap(&mut self.current_tag, &mut plain);
            self.current_compressed = false;
        }
        Ok(self.current_compressed)
    }

    /// Position the cursor on `key`.
    ///
    /// Returns `true` with the cursor on the matching entry, or `false` with
    /// the cursor on the least entry greater than `key` (or at end when no
    /// greater entry exists).
    pub fn find(&mut self, key: &[u8], greater_than: bool) -> Result<bool> {
        // Both forms currently position identically: a miss leaves the
        // cursor on the least entry greater than `key`.
        let _ = greater_than;

        if key.is_empty() {
            return Err(ApiaryError::InvalidArgument(
                "find() requires a non-empty key".to_string(),
            ));
        }

        let mut use_index = true;
        if !self.is_at_end && !self.current_key.is_empty() && self.current_key[0] == key[0] {
            match self.current_key.as_slice().cmp(key) {
                Ordering::Equal => return Ok(true),
                // Moving forwards to a key sharing our first byte: a linear
                // scan from here beats restarting from the index.
                Ordering::Less => use_index = false,
                Ordering::Greater => {}
            }
        }

        if use_index {
            match self.seek_via_index(key)? {
                IndexSeek::Found => return Ok(true),
                IndexSeek::OffTheEnd => return Ok(false),
                IndexSeek::Scan => {
                    self.is_at_end = false;
                    self.val_size = 0;
                }
            }
        }

        while self.next()? {
            match self.current_key.as_slice().cmp(key) {
                Ordering::Equal => return Ok(true),
                Ordering::Greater => break,
                Ordering::Less => {}
            }
        }
        Ok(false)
    }

    fn seek_via_index(&mut self, key: &[u8]) -> Result<IndexSeek> {
        self.file.set_pos(self.root)?;
        let index_type = self.read_data_byte("index type")?;
        match index_type {
            INDEX_ARRAY => {
                let min_byte = self.read_data_byte("array index bounds")?;
                let range = self.read_data_byte("array index bounds")?;
                let cell = key[0].wrapping_sub(min_byte);
                if cell > range {
                    self.is_at_end = true;
                    return Ok(IndexSeek::OffTheEnd);
                }
                self.file.skip(u64::from(cell) * 4)?;
                let jump = self.read_u32_be("array index pointer")?;
                trace!(cell, jump, "array index jump");
                self.file.set_pos(u64::from(jump))?;
                // The jump target starts a fresh prefix chain.
                self.current_key.clear();
                Ok(IndexSeek::Scan)
            }
            INDEX_BINARY_CHOP => self.seek_via_binary_chop(key),
            INDEX_SKIPLIST => self.seek_via_skiplist(key),
            other => Err(ApiaryError::corrupt(format!(
                "unknown index type: {other:#04x}"
            ))),
        }
    }

    fn seek_via_binary_chop(&mut self, key: &[u8]) -> Result<IndexSeek> {
        let count = u64::from(self.read_u32_be("binary chop count")?);
        if count == 0 {
            self.is_at_end = true;
            return Ok(IndexSeek::OffTheEnd);
        }
        let base = self.file.pos();
        let entry_size = (BINARY_CHOP_KEY_SIZE + 4) as u64;
        let key_head = &key[..key.len().min(BINARY_CHOP_KEY_SIZE)];
        let mut prefix = [0u8; BINARY_CHOP_KEY_SIZE];

        // Binary chop for the largest prefix <= key; an exact prefix match
        // ends the search early.
        let mut i = 0u64;
        let mut j = count;
        while j - i > 1 {
            let k = i + (j - i) / 2;
            self.file.set_pos(base + k * entry_size)?;
            self.read_data_exact(&mut prefix, "binary chop prefix")?;
            match key_head.cmp(&prefix[..stripped_len(&prefix)]) {
                Ordering::Less => j = k,
                Ordering::Greater => i = k,
                Ordering::Equal => {
                    i = k;
                    break;
                }
            }
        }

        self.file.set_pos(base + i * entry_size)?;
        self.read_data_exact(&mut prefix, "binary chop prefix")?;
        let len = stripped_len(&prefix);
        let jump = self.read_u32_be("binary chop pointer")?;
        trace!(jump, "binary chop index jump");
        self.file.set_pos(u64::from(jump))?;
        // The jump target is the first entry with this prefix, so decoding
        // resumes as if the prefix were the previous key. A zero jump is the
        // start of the table, where the first entry stands alone.
        self.current_key.clear();
        if jump != 0 {
            self.current_key.extend_from_slice(&prefix[..len]);
        }
        Ok(IndexSeek::Scan)
    }

    fn seek_via_skiplist(&mut self, key: &[u8]) -> Result<IndexSeek> {
        let mut index_key: Vec<u8> = Vec::new();
        let mut prev_index_key: Vec<u8> = Vec::new();
        let mut ptr = 0u64;
        let mut cmp = Ordering::Greater;

        // Walk the prefix-compressed index entries until one exceeds the
        // target; the previous entry's pointer is where we drop down.
        while self.file.pos() < self.index_end {
            let reuse = self.read_data_byte("skiplist entry")? as usize;
            let tail_len = self.read_data_byte("skiplist entry")? as usize;
            if reuse > index_key.len() {
                return Err(ApiaryError::corrupt("skiplist reuse exceeds previous key"));
            }
            index_key.truncate(reuse);
            let mut tail = [0u8; MAX_KEY_LEN];
            self.read_data_exact(&mut tail[..tail_len], "skiplist key")?;
            index_key.extend_from_slice(&tail[..tail_len]);

            cmp = index_key.as_slice().cmp(key);
            if cmp == Ordering::Greater {
                std::mem::swap(&mut index_key, &mut prev_index_key);
                break;
            }
            ptr = self.read_file_varint("skiplist pointer")?;
            if cmp == Ordering::Equal {
                break;
            }
            prev_index_key.clone_from(&index_key);
        }

        trace!(ptr, "skiplist index jump");
        self.file.set_pos(ptr)?;
        if ptr != 0 {
            // The pointer lands on the entry's value header; its key is the
            // index key itself.
            self.current_key.clear();
            self.current_key.extend_from_slice(&index_key);
            self.decode_val_header()?;
            if cmp == Ordering::Equal {
                return Ok(IndexSeek::Found);
            }
            let pending = self.val_size;
            self.file.skip(pending)?;
        } else {
            self.current_key.clear();
        }
        Ok(IndexSeek::Scan)
    }

    /// Move to the entry before the current one (or the last entry when at
    /// end). Returns `false` only when there is no current entry to back
    /// away from.
    pub fn prev(&mut self) -> Result<bool> {
        let target: Vec<u8> = if self.is_at_end {
            // A key greater than any possible key: one byte longer than the
            // longest allowed, all top byte values.
            vec![0xff; MAX_KEY_LEN + 1]
        } else {
            if self.current_key.is_empty() {
                return Ok(false);
            }
            self.current_key.clone()
        };

        // No index assistance yet: restart and scan forward, snapshotting
        // the state before each entry so the last snapshot below `target`
        // can be restored.
        self.rewind()?;

        let mut pos;
        let mut key = Vec::new();
        let mut size;
        let mut compressed;
        loop {
            pos = self.file.pos();
            key.clone_from(&self.current_key);
            size = self.val_size;
            compressed = self.current_compressed;
            if !self.next()? || self.current_key.as_slice() >= target.as_slice() {
                break;
            }
        }

        self.is_at_end = false;
        self.current_key.clone_from(&key);
        self.val_size = size;
        self.current_compressed = compressed;
        if size == 0 {
            self.current_tag.clear();
        }
        self.file.set_pos(pos)?;
        Ok(true)
    }

    /// Read a varint byte-at-a-time from the file, bounded at
    /// [`MAX_VARINT_BYTES`] bytes.
    fn read_file_varint(&mut self, what: &str) -> Result<u64> {
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let mut n = 0;
        loop {
            let byte = self.read_data_byte(what)?;
            buf[n] = byte;
            n += 1;
            if byte < 0x80 {
                break;
            }
            if n == MAX_VARINT_BYTES {
                return Err(ApiaryError::corrupt(format!("{what}: varint too long")));
            }
        }
        let (value, used) = unpack_uint(&buf[..n])?;
        if used != n {
            return Err(ApiaryError::corrupt(format!("{what}: malformed varint")));
        }
        Ok(value)
    }

    fn read_data_byte(&mut self, what: &str) -> Result<u8> {
        match self.file.read_byte() {
            Ok(Some(byte)) => Ok(byte),
            Ok(None) => Err(ApiaryError::corrupt(format!(
                "unexpected end of file reading {what}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn read_data_exact(&mut self, buf: &mut [u8], what: &str) -> Result<()> {
        io::Read::read_exact(&mut self.file, buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                ApiaryError::corrupt(format!("unexpected end of file reading {what}"))
            }
            _ => ApiaryError::Io(e),
        })
    }

    fn read_u32_be(&mut self, what: &str) -> Result<u32> {
        self.file.read_u32::<BigEndian>().map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                ApiaryError::corrupt(format!("unexpected end of file reading {what}"))
            }
            _ => ApiaryError::Io(e),
        })
    }
}

/// Effective length of a zero-padded binary-chop prefix.
fn stripped_len(prefix: &[u8]) -> usize {
    let mut len = prefix.len();
    while len > 0 && prefix[len - 1] == 0 {
        len -= 1;
    }
    len
}
