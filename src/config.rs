use serde::{Deserialize, Serialize};

/// Settings controlling how table values are stored
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSettings {
    /// Compress values when writing tables
    pub compress_values: bool,
    /// Values shorter than this are never worth compressing
    pub compress_min_len: usize,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            compress_values: true,
            compress_min_len: 16,
        }
    }
}

/// BM25 scoring parameters
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f64,
    /// Document-length normalization strength
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}
