//! Leaf posting list reading one term's postings from a table.
//!
//! Posting data is stored as the term's table value: a varint posting
//! count, then for each posting a varint docid delta (strictly positive,
//! from zero) and a varint wdf. Documents therefore come out in strictly
//! ascending id order, matching the posting list contract.

use crate::config::Bm25Params;
use crate::error::{ApiaryError, Result};
use crate::matcher::posting_list::{PostingList, Replacement};
use crate::matcher::scoring::{bm25_idf, bm25_weight, bm25_weight_bound};
use crate::matcher::types::{
    CollectionStats, DocCount, DocId, OrPositionList, TermCount, TermFreqs,
};
use crate::storage::varint::unpack_uint;
use crate::storage::Table;

/// Posting list for a single term, decoded eagerly from its table entry
/// and iterated lazily. Weighted with BM25.
#[derive(Debug)]
pub struct TermPostingList {
    postings: Vec<(DocId, TermCount)>,
    /// `None` before the first positioning call; `Some(len)` at end.
    idx: Option<usize>,
    idf: f64,
    params: Bm25Params,
    average_length: f64,
    collfreq: TermCount,
}

impl TermPostingList {
    /// Look `term` up in `table` and decode its postings.
    ///
    /// Returns `None` when the table has no entry for the term.
    pub fn open(
        table: &Table,
        term: &[u8],
        stats: &CollectionStats,
        params: Bm25Params,
    ) -> Result<Option<Self>> {
        let mut cursor = table.cursor()?;
        if !cursor.find(term, false)? {
            return Ok(None);
        }
        cursor.read_tag(false)?;
        let postings = decode_postings(cursor.current_tag())?;

        let termfreq = postings.len() as DocCount;
        let collfreq = postings.iter().map(|&(_, wdf)| wdf).sum();
        Ok(Some(Self {
            postings,
            idx: None,
            idf: bm25_idf(termfreq, stats.collection_size),
            params,
            average_length: stats.average_length,
            collfreq,
        }))
    }

    fn max_weight(&self) -> f64 {
        bm25_weight_bound(&self.params, self.idf)
    }

    fn current(&self) -> (DocId, TermCount) {
        debug_assert!(!self.at_end(), "no current posting");
        self.postings[self.idx.expect("not positioned")]
    }
}

fn decode_postings(data: &[u8]) -> Result<Vec<(DocId, TermCount)>> {
    let mut pos = 0usize;
    let (count, used) = unpack_uint(data)?;
    pos += used;

    let mut postings = Vec::with_capacity(count.min(1024) as usize);
    let mut did = 0u64;
    for _ in 0..count {
        let (delta, used) = unpack_uint(&data[pos..])?;
        pos += used;
        if delta == 0 {
            return Err(ApiaryError::corrupt("posting docids must strictly ascend"));
        }
        did = did
            .checked_add(delta)
            .ok_or_else(|| ApiaryError::corrupt("posting docid overflow"))?;
        let (wdf, used) = unpack_uint(&data[pos..])?;
        pos += used;
        if did > u64::from(DocId::MAX) || wdf > u64::from(TermCount::MAX) {
            return Err(ApiaryError::corrupt("posting field out of range"));
        }
        postings.push((did as DocId, wdf as TermCount));
    }
    if pos != data.len() {
        return Err(ApiaryError::Serialization(
            "trailing bytes after posting data".to_string(),
        ));
    }
    Ok(postings)
}

impl PostingList for TermPostingList {
    fn get_docid(&self) -> DocId {
        self.current().0
    }

    fn at_end(&self) -> bool {
        self.idx == Some(self.postings.len())
    }

    fn next(&mut self, w_min: f64) -> Result<Replacement> {
        if w_min > self.max_weight() {
            self.idx = Some(self.postings.len());
            return Ok(None);
        }
        let next = match self.idx {
            None => 0,
            Some(i) => (i + 1).min(self.postings.len()),
        };
        self.idx = Some(next);
        Ok(None)
    }

    fn skip_to(&mut self, did: DocId, w_min: f64) -> Result<Replacement> {
        if w_min > self.max_weight() {
            self.idx = Some(self.postings.len());
            return Ok(None);
        }
        let mut i = self.idx.unwrap_or(0);
        while i < self.postings.len() && self.postings[i].0 < did {
            i += 1;
        }
        self.idx = Some(i);
        Ok(None)
    }

    fn get_weight(
        &self,
        doclen: TermCount,
        _unique_terms: TermCount,
        _wdfdocmax: TermCount,
    ) -> f64 {
        bm25_weight(
            &self.params,
            self.idf,
            self.current().1,
            doclen,
            self.average_length,
        )
    }

    fn recalc_maxweight(&mut self) -> f64 {
        self.max_weight()
    }

    fn get_termfreq(&self) -> DocCount {
        self.postings.len() as DocCount
    }

    fn estimate_termfreqs(&self, _stats: &CollectionStats) -> TermFreqs {
        TermFreqs::new(self.get_termfreq(), 0, self.collfreq)
    }

    fn get_wdf(&self) -> TermCount {
        self.current().1
    }

    fn count_matching_subqs(&self) -> TermCount {
        1
    }

    fn gather_position_lists(&mut self, _out: &mut OrPositionList) {
        // This posting format carries no positional data.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::multi_and::MultiAndPostList;
    use crate::storage::testutil::{IndexKind, TableBuilder};
    use crate::storage::varint::pack_uint;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    fn encode_postings(pairs: &[(DocId, TermCount)]) -> Vec<u8> {
        let mut out = Vec::new();
        pack_uint(&mut out, pairs.len() as u64);
        let mut prev = 0u32;
        for &(did, wdf) in pairs {
            pack_uint(&mut out, u64::from(did - prev));
            pack_uint(&mut out, u64::from(wdf));
            prev = did;
        }
        out
    }

    fn stats() -> CollectionStats {
        CollectionStats {
            collection_size: 100,
            rset_size: 0,
            total_length: 12_000,
            average_length: 120.0,
        }
    }

    fn build_postings_table(terms: &[(&[u8], &[(DocId, TermCount)])]) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("postings.apt");
        let mut builder = TableBuilder::default();
        for (term, pairs) in terms {
            builder.add(term, &encode_postings(pairs));
        }
        builder.write(&path, IndexKind::Skiplist { every: 2 }).unwrap();
        (dir, path)
    }

    #[test]
    fn test_open_and_iterate() {
        let (_dir, path) = build_postings_table(&[
            (b"rust", &[(1, 2), (4, 1), (9, 3)]),
            (b"search", &[(4, 1), (9, 2), (11, 1)]),
        ]);
        let table = Table::open(&path).unwrap();

        let mut list = TermPostingList::open(&table, b"rust", &stats(), Bm25Params::default())
            .unwrap()
            .unwrap();
        assert_eq!(list.get_termfreq(), 3);

        let mut seen = Vec::new();
        loop {
            list.next(0.0).unwrap();
            if list.at_end() {
                break;
            }
            seen.push((list.get_docid(), list.get_wdf()));
        }
        assert_eq!(seen, vec![(1, 2), (4, 1), (9, 3)]);
    }

    #[test]
    fn test_missing_term_is_none() {
        let (_dir, path) = build_postings_table(&[(b"rust", &[(1, 1)])]);
        let table = Table::open(&path).unwrap();
        let list =
            TermPostingList::open(&table, b"python", &stats(), Bm25Params::default()).unwrap();
        assert!(list.is_none());
    }

    #[test]
    fn test_weights_are_bounded() {
        let (_dir, path) = build_postings_table(&[(b"rust", &[(1, 2), (4, 10), (9, 3)])]);
        let table = Table::open(&path).unwrap();
        let mut list = TermPostingList::open(&table, b"rust", &stats(), Bm25Params::default())
            .unwrap()
            .unwrap();

        let bound = list.recalc_maxweight();
        assert!(bound > 0.0);
        loop {
            list.next(0.0).unwrap();
            if list.at_end() {
                break;
            }
            let weight = list.get_weight(120, 30, 10);
            assert!(weight > 0.0);
            assert!(weight <= bound + 1e-9);
        }
    }

    #[test]
    fn test_skip_to() {
        let (_dir, path) = build_postings_table(&[(b"rust", &[(1, 1), (5, 1), (20, 1)])]);
        let table = Table::open(&path).unwrap();
        let mut list = TermPostingList::open(&table, b"rust", &stats(), Bm25Params::default())
            .unwrap()
            .unwrap();
        list.skip_to(6, 0.0).unwrap();
        assert_eq!(list.get_docid(), 20);
        list.skip_to(21, 0.0).unwrap();
        assert!(list.at_end());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.apt");
        let mut value = encode_postings(&[(1, 1)]);
        value.push(0x00);
        let mut builder = TableBuilder::default();
        builder.add(b"rust", &value);
        builder.write(&path, IndexKind::Array).unwrap();

        let table = Table::open(&path).unwrap();
        let err = TermPostingList::open(&table, b"rust", &stats(), Bm25Params::default())
            .unwrap_err();
        assert!(matches!(err, ApiaryError::Serialization(_)));
    }

    #[test]
    fn test_non_ascending_docids_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dup.apt");
        // Two postings with a zero delta between them.
        let mut value = Vec::new();
        pack_uint(&mut value, 2);
        pack_uint(&mut value, 3);
        pack_uint(&mut value, 1);
        pack_uint(&mut value, 0);
        pack_uint(&mut value, 1);
        let mut builder = TableBuilder::default();
        builder.add(b"rust", &value);
        builder.write(&path, IndexKind::Array).unwrap();

        let table = Table::open(&path).unwrap();
        let err = TermPostingList::open(&table, b"rust", &stats(), Bm25Params::default())
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_conjunction_over_a_table() {
        let (_dir, path) = build_postings_table(&[
            (b"engine", &[(2, 1), (3, 2), (7, 1), (9, 1)]),
            (b"rust", &[(1, 2), (3, 1), (7, 2), (8, 1)]),
            (b"search", &[(3, 1), (5, 1), (7, 3), (9, 2)]),
        ]);
        let table = Table::open(&path).unwrap();
        let stats = stats();
        let params = Bm25Params::default();

        let mut children: Vec<Box<dyn PostingList>> = Vec::new();
        for term in [b"engine".as_slice(), b"rust", b"search"] {
            let list = TermPostingList::open(&table, term, &stats, params)
                .unwrap()
                .unwrap();
            children.push(Box::new(list));
        }
        let mut and = MultiAndPostList::new(children, stats.collection_size);
        let bound = and.recalc_maxweight();

        let mut matches = Vec::new();
        loop {
            and.next(0.0).unwrap();
            if and.at_end() {
                break;
            }
            let weight = and.get_weight(120, 40, 10);
            assert!(weight > 0.0);
            assert!(weight <= bound + 1e-9);
            matches.push(and.get_docid());
        }
        assert_eq!(matches, vec![3, 7]);
    }
}
