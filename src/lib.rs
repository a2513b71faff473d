pub mod config;
pub mod error;
pub mod matcher;
pub mod registry;
pub mod storage;

pub use config::{Bm25Params, TableSettings};
pub use error::{ApiaryError, Result};
pub use matcher::{
    CollectionStats, DocCount, DocId, MemoryPostingList, MultiAndPostList, PostingList,
    TermPostingList,
};
pub use registry::{Registered, Registry};
pub use storage::{Table, TableCursor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
