//! Query matching: posting list iterators and their combinators.
//!
//! The matcher models each subquery as a lazy iterator over ascending
//! document ids (`PostingList`). Combinators own their children and may
//! receive replacement nodes from positioning calls, letting the tree
//! shrink as subqueries exhaust.

mod memory;
mod multi_and;
mod posting_list;
pub mod scoring;
mod term;
mod types;

pub use memory::{MemoryPosting, MemoryPostingList};
pub use multi_and::MultiAndPostList;
pub use posting_list::{PostingList, Replacement};
pub use term::TermPostingList;
pub use types::{CollectionStats, DocCount, DocId, OrPositionList, TermCount, TermFreqs};
