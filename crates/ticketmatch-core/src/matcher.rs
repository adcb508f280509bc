//! Match pipeline: issue + description → embed → rank. Builds nothing; the corpus
//! is loaded once and handed in.

use std::sync::Arc;

use tracing::{info, warn};

use crate::corpus::Corpus;
use crate::embedder::{Embedder, EmbeddingError};
use crate::ranker::{LinearScan, RankError, RankedResult, Retriever};

/// Text that gets embedded for a ticket: the issue line, a newline, then the description.
pub fn ticket_text(issue: &str, description: &str) -> String {
    format!("{issue}\n{description}")
}

/// Finds historical tickets similar to a new one.
pub struct TicketMatcher<E, R = LinearScan> {
    embedder: E,
    retriever: R,
}

impl<E: Embedder> TicketMatcher<E, LinearScan> {
    /// Exhaustive cosine ranking over `corpus`.
    pub fn new(corpus: Arc<Corpus>, embedder: E) -> Self {
        Self::with_retriever(LinearScan::new(corpus), embedder)
    }
}

impl<E: Embedder, R: Retriever> TicketMatcher<E, R> {
    pub fn with_retriever(retriever: R, embedder: E) -> Self {
        Self { embedder, retriever }
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    /// Top `top_k` historical tickets for a new ticket.
    pub async fn find_similar(
        &self,
        issue: &str,
        description: &str,
        top_k: i64,
    ) -> Result<RankedResult<'_>, MatchError> {
        let k = usize::try_from(top_k).map_err(|_| MatchError::InvalidRequest(format!("top_k must be >= 0, got {top_k}")))?;
        if issue.trim().is_empty() && description.trim().is_empty() {
            return Err(MatchError::InvalidRequest("issue and description are both empty".into()));
        }

        let text = ticket_text(issue, description);
        let query = self.embedder.embed(&text).await.inspect_err(|e| {
            warn!(error = %e, "embedding failed");
        })?;
        if let Some(expected) = self.retriever.dimension() {
            if query.len() != expected {
                return Err(EmbeddingError::WrongDimension {
                    expected,
                    actual: query.len(),
                }
                .into());
            }
        }
        self.rank_vector(&query, k)
    }

    /// Rank a query vector that was embedded elsewhere.
    pub fn rank_vector(&self, query: &[f32], k: usize) -> Result<RankedResult<'_>, MatchError> {
        let matches = self.retriever.retrieve(query, k)?;
        info!(requested = k, returned = matches.len(), "matched ticket");
        Ok(matches)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("embedding unavailable: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("ranking failed: {0}")]
    Rank(#[from] RankError),
}
