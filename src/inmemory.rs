//! In-memory chunk store with hybrid search.
//!
//! This module provides [`InMemoryStore`], a zero-dependency store backed by
//! a `Vec` protected by a `tokio::sync::RwLock`. Vector similarity is cosine
//! similarity; lexical relevance is BM25 computed over the owner's chunks at
//! query time. It is suitable for development, testing, and small corpora.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, DocumentType, ScoredChunk};
use crate::error::Result;
use crate::store::ChunkStore;

/// BM25 term-frequency saturation parameter.
const BM25_K1: f32 = 1.5;
/// BM25 document-length normalization parameter.
const BM25_B: f32 = 0.75;

/// An in-memory chunk store scoring with cosine similarity and BM25.
///
/// Rows are kept in insertion order. All operations are async-safe via
/// `tokio::sync::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// use interview_rag::{ChunkStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.insert_chunks(&chunks).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    chunks: RwLock<Vec<Chunk>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Lowercase and split on non-alphanumeric characters. Hangul counts as
/// alphanumeric, so Korean and Latin text tokenize uniformly.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// BM25 scores for every document against the query terms, normalized by
/// the in-pool maximum so the lexical signal lands in `[0, 1]` and can be
/// blended with cosine similarity.
fn bm25_scores(query_terms: &[String], documents: &[Vec<String>]) -> Vec<f32> {
    let doc_count = documents.len();
    let mut scores = vec![0.0f32; doc_count];
    if doc_count == 0 || query_terms.is_empty() {
        return scores;
    }

    let avg_len =
        (documents.iter().map(Vec::len).sum::<usize>() as f32 / doc_count as f32).max(1.0);

    for term in query_terms {
        let df = documents.iter().filter(|doc| doc.iter().any(|t| t == term)).count() as f32;
        if df == 0.0 {
            continue;
        }
        let idf = ((doc_count as f32 - df + 0.5) / (df + 0.5) + 1.0).ln();
        for (i, doc) in documents.iter().enumerate() {
            let tf = doc.iter().filter(|t| *t == term).count() as f32;
            if tf == 0.0 {
                continue;
            }
            let len_norm = 1.0 - BM25_B + BM25_B * (doc.len() as f32 / avg_len);
            scores[i] += idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * len_norm);
        }
    }

    let max = scores.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for score in &mut scores {
            *score /= max;
        }
    }
    scores
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut rows = self.chunks.write().await;
        for chunk in chunks {
            if let Some(existing) = rows.iter_mut().find(|row| row.id == chunk.id) {
                *existing = chunk.clone();
            } else {
                rows.push(chunk.clone());
            }
        }
        Ok(())
    }

    async fn get_chunk(&self, id: &str, owner_id: &str) -> Result<Option<Chunk>> {
        let rows = self.chunks.read().await;
        Ok(rows.iter().find(|row| row.id == id && row.owner_id == owner_id).cloned())
    }

    async fn list_chunks(
        &self,
        owner_id: &str,
        doc_type: Option<DocumentType>,
    ) -> Result<Vec<Chunk>> {
        let rows = self.chunks.read().await;
        Ok(rows
            .iter()
            .filter(|row| {
                row.owner_id == owner_id && doc_type.is_none_or(|t| row.doc_type == t)
            })
            .cloned()
            .collect())
    }

    async fn delete_document(&self, document_id: &str, owner_id: &str) -> Result<bool> {
        let mut rows = self.chunks.write().await;
        let parent =
            match rows.iter().find(|row| row.id == document_id && row.owner_id == owner_id) {
                Some(row) => row.parent_document_id.clone(),
                None => return Ok(false),
            };
        match parent {
            Some(parent) => rows.retain(|row| {
                !(row.owner_id == owner_id
                    && row.parent_document_id.as_deref() == Some(parent.as_str()))
            }),
            None => rows.retain(|row| !(row.owner_id == owner_id && row.id == document_id)),
        }
        Ok(true)
    }

    async fn hybrid_search(
        &self,
        owner_id: &str,
        query_embedding: &[f32],
        query_text: &str,
        match_count: usize,
        vector_weight: f32,
        bm25_weight: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = self.chunks.read().await;
        let owned: Vec<&Chunk> = rows.iter().filter(|row| row.owner_id == owner_id).collect();

        let query_terms = tokenize(query_text);
        let documents: Vec<Vec<String>> = owned.iter().map(|row| tokenize(&row.text)).collect();
        let lexical = bm25_scores(&query_terms, &documents);

        let mut scored: Vec<ScoredChunk> = owned
            .into_iter()
            .zip(lexical)
            .map(|(chunk, bm25_score)| {
                let vector_score = cosine_similarity(&chunk.embedding, query_embedding);
                ScoredChunk {
                    chunk: chunk.clone(),
                    vector_score,
                    bm25_score,
                    combined_score: vector_weight * vector_score + bm25_weight * bm25_score,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.combined_score.partial_cmp(&a.combined_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(match_count);
        Ok(scored)
    }

    async fn vector_search(
        &self,
        owner_id: &str,
        query_embedding: &[f32],
        threshold: f32,
        match_count: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = self.chunks.read().await;
        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .filter(|row| row.owner_id == owner_id)
            .filter_map(|chunk| {
                let vector_score = cosine_similarity(&chunk.embedding, query_embedding);
                (vector_score >= threshold).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    vector_score,
                    bm25_score: 0.0,
                    combined_score: vector_score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.combined_score.partial_cmp(&a.combined_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(match_count);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;
    use crate::document::ChunkKind;

    fn sample_chunk(id: &str, owner_id: &str, text: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            doc_type: DocumentType::Resume,
            filename: "resume.txt".to_string(),
            text: text.to_string(),
            embedding,
            parent_document_id: None,
            index: 0,
            total: 1,
            section: None,
            kind: ChunkKind::Content,
            char_count: text.chars().count(),
            token_estimate: 1,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tokenize_handles_mixed_scripts() {
        assert_eq!(tokenize("React 3년차 개발자!"), vec!["react", "3년차", "개발자"]);
    }

    #[test]
    fn bm25_ranks_matching_document_highest() {
        let documents =
            vec![tokenize("redis cache tuning guide"), tokenize("flower garden design")];
        let scores = bm25_scores(&tokenize("redis cache"), &documents);
        assert_eq!(scores[0], 1.0);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn cosine_similarity_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn hybrid_search_respects_weights() {
        let store = InMemoryStore::new();
        store
            .insert_chunks(&[
                sample_chunk("lex", "u1", "redis cache tuning", vec![0.0, 1.0]),
                sample_chunk("vec", "u1", "unrelated gardening notes", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let lexical_first =
            store.hybrid_search("u1", &[1.0, 0.0], "redis cache", 10, 0.0, 1.0).await.unwrap();
        assert_eq!(lexical_first[0].chunk.id, "lex");

        let vector_first =
            store.hybrid_search("u1", &[1.0, 0.0], "redis cache", 10, 1.0, 0.0).await.unwrap();
        assert_eq!(vector_first[0].chunk.id, "vec");
    }

    #[tokio::test]
    async fn hybrid_search_is_scoped_to_owner() {
        let store = InMemoryStore::new();
        store
            .insert_chunks(&[
                sample_chunk("a", "u1", "redis cache", vec![1.0, 0.0]),
                sample_chunk("b", "u2", "redis cache", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.hybrid_search("u1", &[1.0, 0.0], "redis", 10, 0.7, 0.3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "a");
    }

    #[tokio::test]
    async fn vector_search_applies_threshold() {
        let store = InMemoryStore::new();
        store
            .insert_chunks(&[
                sample_chunk("close", "u1", "text", vec![1.0, 0.0]),
                sample_chunk("far", "u1", "text", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.vector_search("u1", &[1.0, 0.0], 0.5, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "close");
        assert_eq!(hits[0].bm25_score, 0.0);
        assert_eq!(hits[0].combined_score, hits[0].vector_score);
    }

    #[tokio::test]
    async fn delete_document_cascades_to_siblings() {
        let store = InMemoryStore::new();
        let mut first = sample_chunk("c1", "u1", "part one", vec![1.0, 0.0]);
        first.parent_document_id = Some("parent".to_string());
        let mut second = sample_chunk("c2", "u1", "part two", vec![1.0, 0.0]);
        second.parent_document_id = Some("parent".to_string());
        let other = sample_chunk("c3", "u1", "other doc", vec![1.0, 0.0]);
        store.insert_chunks(&[first, second, other]).await.unwrap();

        assert!(store.delete_document("c1", "u1").await.unwrap());
        let remaining = store.list_chunks("u1", None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "c3");

        assert!(!store.delete_document("c1", "u1").await.unwrap());
    }

    #[tokio::test]
    async fn insert_replaces_existing_row() {
        let store = InMemoryStore::new();
        store.insert_chunks(&[sample_chunk("c1", "u1", "old", vec![1.0])]).await.unwrap();
        store.insert_chunks(&[sample_chunk("c1", "u1", "new", vec![1.0])]).await.unwrap();

        let rows = store.list_chunks("u1", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "new");
    }

    #[tokio::test]
    async fn list_chunks_filters_by_type() {
        let store = InMemoryStore::new();
        let mut company = sample_chunk("c2", "u1", "company notes", vec![1.0]);
        company.doc_type = DocumentType::Company;
        store
            .insert_chunks(&[sample_chunk("c1", "u1", "resume text", vec![1.0]), company])
            .await
            .unwrap();

        let resumes = store.list_chunks("u1", Some(DocumentType::Resume)).await.unwrap();
        assert_eq!(resumes.len(), 1);
        assert_eq!(resumes[0].id, "c1");
    }
}
