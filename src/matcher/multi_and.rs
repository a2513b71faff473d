//! N-way conjunctive posting list.

use crate::error::Result;
use crate::matcher::posting_list::{PostingList, Replacement};
use crate::matcher::types::{
    CollectionStats, DocCount, DocId, OrPositionList, TermCount, TermFreqs,
};

/// Emits the documents present in all of its children, weighting each as
/// the sum of the children's weights.
///
/// The first child drives iteration; the others are probed with `check` and
/// pulled level with `skip_to`. Children may hand back replacement nodes
/// from any positioning call; the parent splices them in and refreshes its
/// cached per-child maxima.
pub struct MultiAndPostList {
    plist: Vec<Box<dyn PostingList>>,
    max_wt: Vec<f64>,
    max_total: f64,
    /// Current matching document, 0 when exhausted.
    did: DocId,
    /// Document count of the shard, for the independence estimate.
    db_size: DocCount,
}

impl MultiAndPostList {
    pub fn new(children: Vec<Box<dyn PostingList>>, db_size: DocCount) -> Self {
        debug_assert!(children.len() >= 2, "conjunction needs at least two children");
        let n_kids = children.len();
        Self {
            plist: children,
            max_wt: vec![0.0; n_kids],
            max_total: 0.0,
            did: 0,
            db_size,
        }
    }

    fn splice_child(&mut self, i: usize, replacement: Replacement) {
        if let Some(new_child) = replacement {
            self.plist[i] = new_child;
            let new_max = self.plist[i].recalc_maxweight();
            self.max_total += new_max - self.max_wt[i];
            self.max_wt[i] = new_max;
        }
    }

    /// `w_min` share left for child `i` once every other child contributes
    /// its maximum.
    fn child_w_min(&self, i: usize, w_min: f64) -> f64 {
        w_min - (self.max_total - self.max_wt[i])
    }

    fn next_helper(&mut self, i: usize, w_min: f64) -> Result<()> {
        let w = self.child_w_min(i, w_min);
        let replacement = self.plist[i].next(w)?;
        self.splice_child(i, replacement);
        Ok(())
    }

    fn skip_to_helper(&mut self, i: usize, did: DocId, w_min: f64) -> Result<()> {
        let w = self.child_w_min(i, w_min);
        let replacement = self.plist[i].skip_to(did, w)?;
        self.splice_child(i, replacement);
        Ok(())
    }

    fn check_helper(&mut self, i: usize, did: DocId, w_min: f64) -> Result<bool> {
        let w = self.child_w_min(i, w_min);
        let (replacement, valid) = self.plist[i].check(did, w)?;
        self.splice_child(i, replacement);
        Ok(valid)
    }

    /// Synchronise all children onto the first common document at or after
    /// child 0's current position.
    fn find_next_match(&mut self, w_min: f64) -> Result<()> {
        'retry: loop {
            if self.plist[0].at_end() {
                self.did = 0;
                return Ok(());
            }
            self.did = self.plist[0].get_docid();
            for i in 1..self.plist.len() {
                if !self.check_helper(i, self.did, w_min)? {
                    self.next_helper(0, w_min)?;
                    continue 'retry;
                }
                if self.plist[i].at_end() {
                    self.did = 0;
                    return Ok(());
                }
                let new_did = self.plist[i].get_docid();
                if new_did != self.did {
                    self.skip_to_helper(0, new_did, w_min)?;
                    continue 'retry;
                }
            }
            return Ok(());
        }
    }
}

impl PostingList for MultiAndPostList {
    fn get_docid(&self) -> DocId {
        self.did
    }

    fn at_end(&self) -> bool {
        self.did == 0
    }

    fn next(&mut self, w_min: f64) -> Result<Replacement> {
        self.next_helper(0, w_min)?;
        self.find_next_match(w_min)?;
        Ok(None)
    }

    fn skip_to(&mut self, did: DocId, w_min: f64) -> Result<Replacement> {
        self.skip_to_helper(0, did, w_min)?;
        self.find_next_match(w_min)?;
        Ok(None)
    }

    fn get_weight(&self, doclen: TermCount, unique_terms: TermCount, wdfdocmax: TermCount) -> f64 {
        debug_assert!(self.did != 0);
        self.plist
            .iter()
            .map(|child| child.get_weight(doclen, unique_terms, wdfdocmax))
            .sum()
    }

    fn recalc_maxweight(&mut self) -> f64 {
        self.max_total = 0.0;
        for (child, slot) in self.plist.iter_mut().zip(self.max_wt.iter_mut()) {
            *slot = child.recalc_maxweight();
            self.max_total += *slot;
        }
        self.max_total
    }

    fn get_termfreq(&self) -> DocCount {
        debug_assert!(self.db_size > 0);
        // Assuming independence, the estimate is the product of the
        // children's estimates divided by db_size once per extra child.
        let mut estimate = f64::from(self.plist[0].get_termfreq());
        for child in &self.plist[1..] {
            estimate = estimate * f64::from(child.get_termfreq()) / f64::from(self.db_size);
        }
        (estimate + 0.5) as DocCount
    }

    fn estimate_termfreqs(&self, stats: &CollectionStats) -> TermFreqs {
        debug_assert!(stats.collection_size > 0);
        let first = self.plist[0].estimate_termfreqs(stats);
        let mut termfreq = f64::from(first.termfreq);
        let mut reltermfreq = f64::from(first.reltermfreq);
        let mut collfreq = f64::from(first.collfreq);

        for child in &self.plist[1..] {
            let freqs = child.estimate_termfreqs(stats);
            termfreq = termfreq * f64::from(freqs.termfreq) / f64::from(stats.collection_size);
            if stats.total_length != 0 {
                collfreq = collfreq * f64::from(freqs.collfreq) / stats.total_length as f64;
            }
            if stats.rset_size != 0 {
                reltermfreq =
                    reltermfreq * f64::from(freqs.reltermfreq) / f64::from(stats.rset_size);
            }
        }

        TermFreqs::new(
            (termfreq + 0.5) as DocCount,
            (reltermfreq + 0.5) as DocCount,
            (collfreq + 0.5) as TermCount,
        )
    }

    fn get_wdf(&self) -> TermCount {
        self.plist.iter().map(|child| child.get_wdf()).sum()
    }

    fn count_matching_subqs(&self) -> TermCount {
        self.plist
            .iter()
            .map(|child| child.count_matching_subqs())
            .sum()
    }

    fn gather_position_lists(&mut self, out: &mut OrPositionList) {
        for child in &mut self.plist {
            child.gather_position_lists(out);
        }
    }
}
