//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](Embedder::embed_batch)
/// implementation embeds every input concurrently; backends with a native
/// batch endpoint should override it.
///
/// # Example
///
/// ```rust,ignore
/// use interview_rag::Embedder;
///
/// let embedder = MyEmbedder::new();
/// let embedding = embedder.embed("지원동기를 말씀해 주세요").await?;
/// assert_eq!(embedding.len(), embedder.dimensions());
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Returns one vector per input, in input order. The default
    /// implementation fires one [`embed`](Embedder::embed) future per input
    /// and awaits them together; any failure fails the whole batch so no
    /// partial result can be observed. Override this method if the backend
    /// supports native batch embedding.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        try_join_all(texts.iter().map(|text| self.embed(text))).await
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}
