//! Embedding boundary. The core only needs `embed(text) -> vector`; the Ollama
//! implementation wraps ollama-rs and bounds each call with a timeout.

use std::time::Duration;

use async_trait::async_trait;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Embeds text through an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    inner: Ollama,
    embed_model: String,
    timeout: Duration,
}

impl OllamaEmbedder {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, EmbeddingError> {
        let inner = Ollama::try_new(url).map_err(EmbeddingError::InvalidUrl)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set the embedding model (e.g. `nomic-embed-text`, `all-minilm`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Single(text.to_string()),
        );
        let res = match tokio::time::timeout(self.timeout, self.inner.generate_embeddings(req)).await {
            Ok(res) => res.map_err(EmbeddingError::Request)?,
            Err(_) => {
                warn!(model = %self.embed_model, timeout = ?self.timeout, "embedding request timed out");
                return Err(EmbeddingError::Timeout(self.timeout));
            }
        };
        let embedding = res.embeddings.into_iter().next().unwrap_or_default();
        if embedding.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }
        debug!(model = %self.embed_model, dimension = embedding.len(), "embedded text");
        Ok(embedding)
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid Ollama URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),
    #[error("embedding response contained no vector")]
    EmptyResponse,
    #[error("embedding has dimension {actual}, corpus expects {expected}")]
    WrongDimension { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_url() {
        let err = OllamaEmbedder::from_url("not a url").unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidUrl(_)));
    }

    #[test]
    fn builder_sets_model_and_timeout() {
        let e = OllamaEmbedder::from_url(DEFAULT_BASE_URL)
            .unwrap()
            .with_embed_model("all-minilm")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(e.embed_model(), "all-minilm");
        assert_eq!(e.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_not_hung() {
        // Port 9 (discard) is closed on test hosts; the call must fail or time out, never panic.
        let e = OllamaEmbedder::from_url("http://127.0.0.1:9")
            .unwrap()
            .with_timeout(Duration::from_secs(2));
        let err = e.embed("VPN connection timeout").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Request(_) | EmbeddingError::Timeout(_)));
    }
}
