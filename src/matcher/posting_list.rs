//! The iterator contract shared by all matcher nodes.

use crate::error::Result;
use crate::matcher::types::{CollectionStats, DocCount, DocId, OrPositionList, TermCount, TermFreqs};

/// A node returned by a positioning call to take the receiver's place in
/// the iterator tree. `None` means the receiver stays where it is.
///
/// Combinators can shrink as their children exhaust; the parent splices the
/// replacement in and recomputes any cached maxima.
pub type Replacement = Option<Box<dyn PostingList>>;

/// A lazy, restartable sequence of matching documents in strictly ascending
/// document id order.
///
/// Positioning calls take `w_min`, the minimum weight contribution the
/// caller still cares about; an iterator whose upper bound falls below it
/// may skip ahead arbitrarily or end early.
pub trait PostingList {
    /// Current document id. Only meaningful after a successful positioning
    /// call and before `at_end()` turns true.
    fn get_docid(&self) -> DocId;

    fn at_end(&self) -> bool;

    /// Advance to the next match worth at least `w_min`.
    fn next(&mut self, w_min: f64) -> Result<Replacement>;

    /// Advance to the first match with document id at least `did` worth at
    /// least `w_min`.
    fn skip_to(&mut self, did: DocId, w_min: f64) -> Result<Replacement>;

    /// Probe whether `did` could match without necessarily positioning the
    /// iterator exactly. The returned flag is false when the iterator did
    /// not position itself, in which case `get_docid()` is meaningless and
    /// the caller must not rely on it.
    fn check(&mut self, did: DocId, w_min: f64) -> Result<(Replacement, bool)> {
        let replacement = self.skip_to(did, w_min)?;
        Ok((replacement, true))
    }

    /// Weight contribution of the current document.
    fn get_weight(&self, doclen: TermCount, unique_terms: TermCount, wdfdocmax: TermCount) -> f64;

    /// Refresh and return the upper bound on the weight contribution of any
    /// remaining document.
    fn recalc_maxweight(&mut self) -> f64;

    /// Estimated number of matching documents.
    fn get_termfreq(&self) -> DocCount;

    /// Component-wise frequency estimates against the given statistics.
    fn estimate_termfreqs(&self, stats: &CollectionStats) -> TermFreqs;

    /// Within-document frequency at the current document.
    fn get_wdf(&self) -> TermCount;

    /// Number of leaf subqueries matching at the current document.
    fn count_matching_subqs(&self) -> TermCount;

    /// Collect the position lists contributing at the current document.
    fn gather_position_lists(&mut self, out: &mut OrPositionList);
}
