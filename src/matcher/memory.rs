//! In-memory posting lists.
//!
//! Used by the in-memory backend and as leaves in matcher tests. Weights
//! follow a simple per-term factor model: each match contributes its wdf
//! times the list's weight factor.

use crate::error::Result;
use crate::matcher::posting_list::{PostingList, Replacement};
use crate::matcher::types::{
    CollectionStats, DocCount, DocId, OrPositionList, TermCount, TermFreqs,
};

/// One posting held in memory.
#[derive(Clone, Debug)]
pub struct MemoryPosting {
    pub docid: DocId,
    pub wdf: TermCount,
    pub positions: Vec<TermCount>,
}

impl MemoryPosting {
    pub fn new(docid: DocId, wdf: TermCount) -> Self {
        Self {
            docid,
            wdf,
            positions: Vec::new(),
        }
    }

    pub fn with_positions(docid: DocId, wdf: TermCount, positions: Vec<TermCount>) -> Self {
        Self {
            docid,
            wdf,
            positions,
        }
    }
}

/// A posting list over an in-memory vector of postings.
pub struct MemoryPostingList {
    postings: Vec<MemoryPosting>,
    /// `None` before the first positioning call; `Some(len)` at end.
    idx: Option<usize>,
    weight_factor: f64,
    max_wdf: TermCount,
    freqs: TermFreqs,
}

impl MemoryPostingList {
    /// Build from postings already in ascending document id order.
    pub fn new(postings: Vec<MemoryPosting>, weight_factor: f64) -> Self {
        debug_assert!(
            postings.windows(2).all(|w| w[0].docid < w[1].docid),
            "postings must be in ascending docid order"
        );
        let max_wdf = postings.iter().map(|p| p.wdf).max().unwrap_or(0);
        let termfreq = postings.len() as DocCount;
        let collfreq = postings.iter().map(|p| p.wdf).sum();
        Self {
            postings,
            idx: None,
            weight_factor,
            max_wdf,
            freqs: TermFreqs::new(termfreq, 0, collfreq),
        }
    }

    pub fn from_pairs(pairs: &[(DocId, TermCount)], weight_factor: f64) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(docid, wdf)| MemoryPosting::new(docid, wdf))
                .collect(),
            weight_factor,
        )
    }

    /// Override the frequency estimates reported to combinators.
    pub fn with_termfreqs(mut self, freqs: TermFreqs) -> Self {
        self.freqs = freqs;
        self
    }

    fn max_weight(&self) -> f64 {
        f64::from(self.max_wdf) * self.weight_factor
    }

    fn current(&self) -> &MemoryPosting {
        debug_assert!(!self.at_end(), "no current posting");
        &self.postings[self.idx.expect("not positioned")]
    }
}

impl PostingList for MemoryPostingList {
    fn get_docid(&self) -> DocId {
        self.current().docid
    }

    fn at_end(&self) -> bool {
        self.idx == Some(self.postings.len())
    }

    fn next(&mut self, w_min: f64) -> Result<Replacement> {
        if w_min > self.max_weight() {
            // Nothing left can reach w_min.
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
        while i < self.postings.len() && self.postings[i].docid < did {
            i += 1;
        }
        self.idx = Some(i);
        Ok(None)
    }

    fn get_weight(
        &self,
        _doclen: TermCount,
        _unique_terms: TermCount,
        _wdfdocmax: TermCount,
    ) -> f64 {
        f64::from(self.current().wdf) * self.weight_factor
    }

    fn recalc_maxweight(&mut self) -> f64 {
        self.max_weight()
    }

    fn get_termfreq(&self) -> DocCount {
        self.freqs.termfreq
    }

    fn estimate_termfreqs(&self, _stats: &CollectionStats) -> TermFreqs {
        self.freqs
    }

    fn get_wdf(&self) -> TermCount {
        self.current().wdf
    }

    fn count_matching_subqs(&self) -> TermCount {
        1
    }

    fn gather_position_lists(&mut self, out: &mut OrPositionList) {
        if !self.at_end() {
            out.add_positions(&self.current().positions);
        }
    }
}
