//! BM25 weighting for term posting lists.

use crate::config::Bm25Params;
use crate::matcher::types::{DocCount, TermCount};

/// Inverse document frequency component of BM25.
///
/// Uses the +1 smoothed form so the result is always positive, even for
/// terms present in more than half the collection.
pub fn bm25_idf(termfreq: DocCount, collection_size: DocCount) -> f64 {
    let df = termfreq as f64;
    let n = collection_size as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// BM25 weight contribution of one term occurrence profile in one document.
pub fn bm25_weight(
    params: &Bm25Params,
    idf: f64,
    wdf: TermCount,
    doclen: TermCount,
    average_length: f64,
) -> f64 {
    if wdf == 0 {
        return 0.0;
    }
    let tf = wdf as f64;
    let norm = if average_length > 0.0 {
        1.0 - params.b + params.b * (doclen as f64 / average_length)
    } else {
        1.0
    };
    idf * (tf * (params.k1 + 1.0)) / (tf + params.k1 * norm)
}

/// Upper bound on [`bm25_weight`] over all possible `wdf` and `doclen`.
///
/// The tf component tends to `k1 + 1` as `wdf` grows, so `idf * (k1 + 1)`
/// bounds every achievable weight.
pub fn bm25_weight_bound(params: &Bm25Params, idf: f64) -> f64 {
    idf * (params.k1 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_positive_and_rarer_is_larger() {
        let common = bm25_idf(500, 1000);
        let rare = bm25_idf(5, 1000);
        assert!(common > 0.0);
        assert!(rare > common);
    }

    #[test]
    fn test_weight_monotone_in_wdf() {
        let params = Bm25Params::default();
        let idf = bm25_idf(10, 1000);
        let w1 = bm25_weight(&params, idf, 1, 100, 100.0);
        let w5 = bm25_weight(&params, idf, 5, 100, 100.0);
        assert!(w1 > 0.0);
        assert!(w5 > w1);
    }

    #[test]
    fn test_longer_docs_score_lower() {
        let params = Bm25Params::default();
        let idf = bm25_idf(10, 1000);
        let short = bm25_weight(&params, idf, 3, 50, 100.0);
        let long = bm25_weight(&params, idf, 3, 500, 100.0);
        assert!(short > long);
    }

    #[test]
    fn test_zero_wdf_contributes_nothing() {
        let params = Bm25Params::default();
        let idf = bm25_idf(10, 1000);
        assert_eq!(bm25_weight(&params, idf, 0, 100, 100.0), 0.0);
    }

    #[test]
    fn test_bound_dominates_weights() {
        let params = Bm25Params::default();
        let idf = bm25_idf(10, 1000);
        let bound = bm25_weight_bound(&params, idf);
        for wdf in [1u32, 2, 10, 100, 10_000] {
            for doclen in [1u32, 10, 1000] {
                let w = bm25_weight(&params, idf, wdf, doclen, 120.0);
                assert!(w <= bound + 1e-9, "wdf={wdf} doclen={doclen}");
            }
        }
    }
}
