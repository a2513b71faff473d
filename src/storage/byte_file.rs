//! Buffered positioned reads over an immutable file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// A seekable byte-oriented reader over an immutable file.
///
/// Tracks its own logical position so that repositioning within the read
/// buffer avoids a syscall. Each cursor owns its own `ByteFile`, so tables
/// can be read from several threads at once.
pub struct ByteFile {
    inner: BufReader<File>,
    pos: u64,
    len: u64,
}

impl ByteFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            inner: BufReader::new(file),
            pos: 0,
            len,
        })
    }

    /// Current logical position in the file.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Total file size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read a single byte, or `None` at end of file.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match Read::read_exact(self, &mut byte) {
            Ok(()) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Advance the position by `n` bytes without reading them.
    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        self.inner.seek_relative(n as i64)?;
        self.pos += n;
        Ok(())
    }

    /// Reposition to an absolute offset.
    pub fn set_pos(&mut self, pos: u64) -> io::Result<()> {
        if pos != self.pos {
            self.inner.seek_relative(pos as i64 - self.pos as i64)?;
            self.pos = pos;
        }
        Ok(())
    }
}

impl Read for ByteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}
