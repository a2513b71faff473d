//! Immutable sorted key/value table files.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{ApiaryError, Result};
use crate::storage::cursor::TableCursor;
use crate::storage::format::{footer_pos, read_footer, FOOTER_BYTES, TABLE_MAGIC};

/// Handle to a table file on disk.
///
/// Opening validates the footer; the data itself is read through cursors.
/// Each cursor owns an independent file handle, so a `Table` can hand out
/// cursors to several threads over the same immutable file.
#[derive(Debug)]
pub struct Table {
    path: PathBuf,
    root: u64,
}

impl Table {
    /// Open a table file and validate its footer.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the file is too small for a footer, the magic
    /// does not match, or the root offset points outside the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut f = File::open(&path)?;
        let filesize = f.metadata()?.len();

        if filesize < FOOTER_BYTES {
            return Err(ApiaryError::corrupt("table file too small"));
        }
        let (root, magic) = read_footer(&mut f)?;
        if magic != TABLE_MAGIC {
            return Err(ApiaryError::corrupt(format!(
                "invalid table magic: {magic:x}"
            )));
        }
        if root > footer_pos(filesize) {
            return Err(ApiaryError::corrupt("root offset out of bounds"));
        }

        trace!(root, filesize, "opened table");
        Ok(Self { path, root })
    }

    /// Offset at which the data region ends and the index region begins.
    pub fn root(&self) -> u64 {
        self.root
    }

    /// Open a new cursor positioned at the start of the data region.
    pub fn cursor(&self) -> Result<TableCursor> {
        TableCursor::open(&self.path, self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testutil::{IndexKind, TableBuilder};
    use tempfile::tempdir;

    #[test]
    fn test_open_and_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.apt");

        let mut builder = TableBuilder::default();
        builder.add(b"alpha", b"1");
        builder.add(b"beta", b"2");
        builder.write(&path, IndexKind::Array).unwrap();

        let table = Table::open(&path).unwrap();
        assert!(table.root() > 0);
    }

    #[test]
    fn test_open_file_too_small() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.apt");
        std::fs::write(&path, b"short").unwrap();

        let err = Table::open(&path).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_open_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("badmagic.apt");

        // 12 bytes: 8 for root + 4 for wrong magic.
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&[0xBA, 0xAD, 0xF0, 0x0D]);
        std::fs::write(&path, &data).unwrap();

        let err = Table::open(&path).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_open_root_out_of_bounds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("badroot.apt");

        let mut data = Vec::new();
        crate::storage::format::write_footer(&mut data, 1000).unwrap();
        std::fs::write(&path, &data).unwrap();

        let err = Table::open(&path).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_open_nonexistent_file() {
        let result = Table::open("/tmp/no_such_apiary_table.apt");
        assert!(matches!(result, Err(ApiaryError::Io(_))));
    }

    #[test]
    fn test_independent_cursors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("multi.apt");

        let mut builder = TableBuilder::default();
        builder.add(b"apple", b"1");
        builder.add(b"banana", b"2");
        builder.add(b"cherry", b"3");
        builder.write(&path, IndexKind::Array).unwrap();

        let table = Table::open(&path).unwrap();
        let mut a = table.cursor().unwrap();
        let mut b = table.cursor().unwrap();

        // Interleaved use: each cursor keeps its own position.
        assert!(a.next().unwrap());
        assert!(b.find(b"cherry", false).unwrap());
        assert!(a.next().unwrap());
        assert_eq!(a.current_key(), b"banana");
        assert_eq!(b.current_key(), b"cherry");
    }
}
