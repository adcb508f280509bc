//! Similarity ranking over the corpus. Scores every record against a query vector,
//! orders descending with a stable tie-break on corpus order, and keeps the top k.
//!
//! A full scan is O(N·D). The [Retriever] trait is the seam where an approximate
//! nearest-neighbour index could replace [LinearScan] without changing callers.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::corpus::{Corpus, Metadata};

/// Score given to records whose similarity is undefined (zero-norm vector) or not finite.
/// Sorts below every real score, so such records never outrank a defined match.
pub const UNDEFINED_SCORE: f32 = f32::NEG_INFINITY;

/// A similarity function between a corpus vector and a query vector of equal length.
/// Returns `None` when the score is undefined for this pair.
pub trait Scorer: Send + Sync {
    fn score(&self, candidate: &[f32], query: &[f32]) -> Option<f32>;
}

/// Cosine similarity, in [-1, 1] for non-zero vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl Scorer for Cosine {
    fn score(&self, candidate: &[f32], query: &[f32]) -> Option<f32> {
        // f64 accumulation: squares of any finite f32 neither overflow nor underflow.
        let (nc, nq) = (norm_sq(candidate), norm_sq(query));
        if nc == 0.0 || nq == 0.0 {
            return None;
        }
        let cos = dot(candidate, query) / (nc.sqrt() * nq.sqrt());
        Some(cos.clamp(-1.0, 1.0) as f32)
    }
}

/// One ranked corpus entry. Borrows the record's id and metadata; the embedding stays behind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedMatch<'a> {
    /// Position of the record in the corpus.
    pub position: usize,
    pub id: &'a str,
    pub metadata: &'a Metadata,
    pub score: f32,
}

impl RankedMatch<'_> {
    /// False for records whose similarity could not be computed.
    pub fn has_score(&self) -> bool {
        self.score.is_finite()
    }
}

/// Ranked matches, best first. Never longer than the requested k.
pub type RankedResult<'a> = Vec<RankedMatch<'a>>;

/// Rank `corpus` against `query` by cosine similarity and return the top `k`.
pub fn rank<'a>(corpus: &'a Corpus, query: &[f32], k: usize) -> Result<RankedResult<'a>, RankError> {
    rank_with(corpus, &Cosine, query, k)
}

/// Rank with an explicit scorer. Dimension is checked once up front, so a mismatched
/// query never starts a scan.
pub fn rank_with<'a, S: Scorer + ?Sized>(
    corpus: &'a Corpus,
    scorer: &S,
    query: &[f32],
    k: usize,
) -> Result<RankedResult<'a>, RankError> {
    let Some(expected) = corpus.dimension() else {
        return Ok(Vec::new());
    };
    if query.len() != expected {
        return Err(RankError::DimensionMismatch {
            expected,
            actual: query.len(),
        });
    }
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut scored: Vec<RankedMatch<'a>> = corpus
        .records()
        .iter()
        .enumerate()
        .map(|(position, r)| RankedMatch {
            position,
            id: r.id(),
            metadata: r.metadata(),
            score: scorer
                .score(r.embedding(), query)
                .filter(|s| s.is_finite())
                .unwrap_or(UNDEFINED_SCORE),
        })
        .collect();
    // Stable: equal scores keep corpus order. No NaN reaches this point.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    debug!(
        candidates = corpus.len(),
        returned = scored.len(),
        top_score = scored.first().map(|m| m.score),
        "ranked corpus"
    );
    Ok(scored)
}

/// Anything that turns a query vector into ranked corpus matches.
pub trait Retriever: Send + Sync {
    /// Dimension queries must have; `None` when there is nothing to search.
    fn dimension(&self) -> Option<usize>;

    fn retrieve(&self, query: &[f32], k: usize) -> Result<RankedResult<'_>, RankError>;
}

/// Exhaustive scan of an in-memory corpus.
#[derive(Debug, Clone)]
pub struct LinearScan<S = Cosine> {
    corpus: Arc<Corpus>,
    scorer: S,
}

impl LinearScan<Cosine> {
    pub fn new(corpus: Arc<Corpus>) -> Self {
        Self {
            corpus,
            scorer: Cosine,
        }
    }
}

impl<S: Scorer> LinearScan<S> {
    pub fn with_scorer(corpus: Arc<Corpus>, scorer: S) -> Self {
        Self { corpus, scorer }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }
}

impl<S: Scorer> Retriever for LinearScan<S> {
    fn dimension(&self) -> Option<usize> {
        self.corpus.dimension()
    }

    fn retrieve(&self, query: &[f32], k: usize) -> Result<RankedResult<'_>, RankError> {
        rank_with(&self.corpus, &self.scorer, query, k)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankError {
    #[error("query dimension {actual} does not match corpus dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

fn norm_sq(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum()
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum()
}
