//! Core identifier types and statistics shared by matcher nodes.

/// Document identifier within a shard. Zero is never a valid document and
/// doubles as the "exhausted" sentinel in iterators that need one.
pub type DocId = u32;

/// A count of documents.
pub type DocCount = u32;

/// A count of term occurrences.
pub type TermCount = u32;

/// Frequency estimates for a subquery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TermFreqs {
    /// Estimated number of documents matching the subquery.
    pub termfreq: DocCount,
    /// Estimated matches within the relevance set.
    pub reltermfreq: DocCount,
    /// Estimated total occurrences across the collection.
    pub collfreq: TermCount,
}

impl TermFreqs {
    pub fn new(termfreq: DocCount, reltermfreq: DocCount, collfreq: TermCount) -> Self {
        Self {
            termfreq,
            reltermfreq,
            collfreq,
        }
    }
}

/// Collection-wide statistics consulted when estimating frequencies and
/// computing weights.
#[derive(Clone, Copy, Debug, Default)]
pub struct CollectionStats {
    /// Number of documents in the collection.
    pub collection_size: DocCount,
    /// Number of documents in the relevance set.
    pub rset_size: DocCount,
    /// Total length of all documents, in terms.
    pub total_length: u64,
    /// Mean document length, in terms.
    pub average_length: f64,
}

/// Accumulates the position lists of matching subqueries, merged as a
/// single ascending sequence.
#[derive(Clone, Debug, Default)]
pub struct OrPositionList {
    positions: Vec<TermCount>,
    sorted: bool,
}

impl OrPositionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one subquery's positions.
    pub fn add_positions(&mut self, positions: &[TermCount]) {
        if !positions.is_empty() {
            self.positions.extend_from_slice(positions);
            self.sorted = false;
        }
    }

    /// All gathered positions, ascending and deduplicated.
    pub fn positions(&mut self) -> &[TermCount] {
        if !self.sorted {
            self.positions.sort_unstable();
            self.positions.dedup();
            self.sorted = true;
        }
        &self.positions
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
