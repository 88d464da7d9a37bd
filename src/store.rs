//! Chunk store trait for persisting and searching embedded chunks.

use async_trait::async_trait;

use crate::document::{Chunk, DocumentType, ScoredChunk};
use crate::error::Result;

/// A storage backend for embedded chunks with hybrid search.
///
/// Implementations persist [`Chunk`] rows scoped by owner and serve the two
/// retrieval entry points: the hybrid vector+lexical query and the
/// vector-only query used as its fallback.
///
/// # Example
///
/// ```rust,ignore
/// use interview_rag::{ChunkStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.insert_chunks(&chunks).await?;
/// let hits = store.hybrid_search("user-1", &query_embedding, "React 경험", 10, 0.7, 0.3).await?;
/// ```
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persist chunks atomically: either every chunk is stored or none are.
    /// Chunks must have embeddings set. Existing rows with the same id are
    /// replaced.
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Fetch a single chunk by id, scoped to its owner. Returns `None` when
    /// no such chunk exists for this owner.
    async fn get_chunk(&self, id: &str, owner_id: &str) -> Result<Option<Chunk>>;

    /// List an owner's chunks in insertion order, optionally restricted to
    /// one document type.
    async fn list_chunks(
        &self,
        owner_id: &str,
        doc_type: Option<DocumentType>,
    ) -> Result<Vec<Chunk>>;

    /// Delete the chunk with the given id together with every sibling chunk
    /// sharing its `parent_document_id`.
    ///
    /// Returns `false` when the id does not exist for this owner.
    async fn delete_document(&self, document_id: &str, owner_id: &str) -> Result<bool>;

    /// Rank an owner's chunks by the weighted sum of vector similarity and
    /// lexical relevance against the query.
    ///
    /// Returns up to `match_count` candidates ordered by descending
    /// `combined_score`, with both component scores populated.
    async fn hybrid_search(
        &self,
        owner_id: &str,
        query_embedding: &[f32],
        query_text: &str,
        match_count: usize,
        vector_weight: f32,
        bm25_weight: f32,
    ) -> Result<Vec<ScoredChunk>>;

    /// Rank an owner's chunks by vector similarity alone, dropping
    /// candidates below `threshold`.
    ///
    /// Used as the fallback when [`hybrid_search`](ChunkStore::hybrid_search)
    /// fails. Returns up to `match_count` candidates ordered by descending
    /// similarity, with the similarity mirrored into `combined_score` and
    /// `bm25_score` left at zero.
    async fn vector_search(
        &self,
        owner_id: &str,
        query_embedding: &[f32],
        threshold: f32,
        match_count: usize,
    ) -> Result<Vec<ScoredChunk>>;
}
