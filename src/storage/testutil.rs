//! Test-support builder producing table files for reader tests.
//!
//! Mirrors the writer contract the cursor relies on: strictly ascending
//! keys, prefix chains restarted at index points, and index pointers that
//! land where each index type expects. Array pointers skip the restart
//! entry's zero reuse byte so the jump target reads as a fresh chain;
//! binary-chop pointers include it, because the cursor arrives there with
//! the index prefix standing in for the previous key; skiplist pointers
//! address the entry's value header directly.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::config::TableSettings;
use crate::error::Result;
use crate::storage::format::{
    write_footer, BINARY_CHOP_KEY_SIZE, INDEX_ARRAY, INDEX_BINARY_CHOP, INDEX_SKIPLIST,
    MAX_KEY_LEN,
};
use crate::storage::varint::pack_uint;

/// Which index structure to emit after the data region.
pub(crate) enum IndexKind {
    Array,
    /// Explicit `(prefix, first entry index)` groups, ascending, the first
    /// starting at entry 0. Prefixes are zero-padded on disk.
    BinaryChop { groups: Vec<(Vec<u8>, usize)> },
    /// Index every n-th entry, starting with the first.
    Skiplist { every: usize },
}

pub(crate) struct TableBuilder {
    settings: TableSettings,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new(TableSettings::default())
    }
}

impl TableBuilder {
    pub(crate) fn new(settings: TableSettings) -> Self {
        Self {
            settings,
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(!key.is_empty(), "keys must be non-empty");
        assert!(key.len() <= MAX_KEY_LEN, "key too long");
        if let Some((last, _)) = self.entries.last() {
            assert!(
                last.as_slice() < key,
                "keys must be added in ascending order"
            );
        }
        self.entries.push((key.to_vec(), value.to_vec()));
    }

    pub(crate) fn write(&self, path: &Path, kind: IndexKind) -> Result<()> {
        let restarts = self.restart_set(&kind);

        let mut buf = Vec::new();
        let mut entry_start = Vec::with_capacity(self.entries.len());
        let mut val_header_pos = Vec::with_capacity(self.entries.len());
        let mut last_key: &[u8] = b"";
        for (idx, (key, value)) in self.entries.iter().enumerate() {
            entry_start.push(buf.len() as u64);
            if idx == 0 {
                buf.push(key.len() as u8);
                buf.extend_from_slice(key);
            } else if restarts.contains(&idx) {
                buf.push(0);
                buf.push(key.len() as u8);
                buf.extend_from_slice(key);
            } else {
                let reuse = common_prefix(last_key, key);
                buf.push(reuse as u8);
                buf.push((key.len() - reuse) as u8);
                buf.extend_from_slice(&key[reuse..]);
            }
            val_header_pos.push(buf.len() as u64);

            let (bytes, compressed) = self.encode_value(value);
            pack_uint(&mut buf, ((bytes.len() as u64) << 1) | u64::from(compressed));
            buf.extend_from_slice(&bytes);
            last_key = key;
        }

        let root = buf.len() as u64;
        self.write_index(&mut buf, kind, &entry_start, &val_header_pos);
        write_footer(&mut buf, root)?;
        std::fs::write(path, &buf)?;
        Ok(())
    }

    /// Entries whose prefix chain must restart for the index to work.
    fn restart_set(&self, kind: &IndexKind) -> HashSet<usize> {
        let mut restarts = HashSet::new();
        match kind {
            IndexKind::Array => {
                for (idx, window) in self.entries.windows(2).enumerate() {
                    if window[0].0[0] != window[1].0[0] {
                        restarts.insert(idx + 1);
                    }
                }
            }
            IndexKind::BinaryChop { groups } => {
                for (_, start) in groups {
                    if *start > 0 {
                        restarts.insert(*start);
                    }
                }
            }
            IndexKind::Skiplist { .. } => {}
        }
        restarts
    }

    fn write_index(
        &self,
        buf: &mut Vec<u8>,
        kind: IndexKind,
        entry_start: &[u64],
        val_header_pos: &[u64],
    ) {
        if self.entries.is_empty() {
            // The cheapest valid index for an empty table.
            buf.push(INDEX_BINARY_CHOP);
            buf.extend_from_slice(&0u32.to_be_bytes());
            return;
        }
        match kind {
            IndexKind::Array => {
                let min = self.entries.first().unwrap().0[0];
                let max = self.entries.last().unwrap().0[0];
                buf.push(INDEX_ARRAY);
                buf.push(min);
                buf.push(max - min);
                let mut j = 0usize;
                for byte in min..=max {
                    while self.entries[j].0[0] < byte {
                        j += 1;
                    }
                    let ptr = if j == 0 { 0 } else { entry_start[j] + 1 };
                    buf.extend_from_slice(&u32::try_from(ptr).unwrap().to_be_bytes());
                }
            }
            IndexKind::BinaryChop { groups } => {
                assert!(!groups.is_empty());
                assert_eq!(groups[0].1, 0, "first group must start at entry 0");
                for window in groups.windows(2) {
                    assert!(window[0].0 < window[1].0, "group prefixes must ascend");
                    assert!(window[0].1 < window[1].1, "group starts must ascend");
                }
                buf.push(INDEX_BINARY_CHOP);
                buf.extend_from_slice(&u32::try_from(groups.len()).unwrap().to_be_bytes());
                for (prefix, start) in &groups {
                    assert!(!prefix.is_empty() && prefix.len() <= BINARY_CHOP_KEY_SIZE);
                    assert!(*start < self.entries.len());
                    let mut padded = [0u8; BINARY_CHOP_KEY_SIZE];
                    padded[..prefix.len()].copy_from_slice(prefix);
                    buf.extend_from_slice(&padded);
                    let ptr = if *start == 0 { 0 } else { entry_start[*start] };
                    buf.extend_from_slice(&u32::try_from(ptr).unwrap().to_be_bytes());
                }
            }
            IndexKind::Skiplist { every } => {
                assert!(every > 0);
                buf.push(INDEX_SKIPLIST);
                let mut prev: &[u8] = b"";
                for (idx, (key, _)) in self.entries.iter().enumerate() {
                    if idx % every != 0 {
                        continue;
                    }
                    let reuse = common_prefix(prev, key);
                    buf.push(reuse as u8);
                    buf.push((key.len() - reuse) as u8);
                    buf.extend_from_slice(&key[reuse..]);
                    pack_uint(buf, val_header_pos[idx]);
                    prev = key;
                }
            }
        }
    }

    fn encode_value(&self, value: &[u8]) -> (Vec<u8>, bool) {
        if self.settings.compress_values && value.len() >= self.settings.compress_min_len {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(value).unwrap();
            let packed = encoder.finish().unwrap();
            if packed.len() < value.len() {
                return (packed, true);
            }
        }
        (value.to_vec(), false)
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
