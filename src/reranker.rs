//! Reranker trait for re-scoring search candidates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::SearchResult;
use crate::error::Result;

/// A reranked document reference: the document's position in the input
/// list plus the relevance score the reranking model assigned to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankResult {
    /// Index into the input document list.
    pub index: usize,
    /// Relevance of the document to the query (higher is more relevant).
    pub relevance_score: f32,
}

/// A second-pass relevance model that reorders candidate texts.
///
/// Implementations can use cross-encoder models, LLM-based scoring, or
/// other strategies to improve precision beyond the first-pass hybrid
/// score. Search never calls a reranker directly; it goes through
/// [`rerank_with_fallback`] so a reranker failure degrades to the
/// pre-rerank order instead of failing the query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank `documents` against `query`.
    ///
    /// Returns up to `top_n` entries ordered by descending relevance.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankResult>>;
}

/// A lexical reranker scoring by query-term overlap.
///
/// The score of a document is the fraction of distinct query terms it
/// contains. No model or network access is involved, which makes it useful
/// for development and as a cheap second pass over small candidate pools.
///
/// # Example
///
/// ```rust,ignore
/// use interview_rag::{Reranker, TermOverlapReranker};
///
/// let reranker = TermOverlapReranker::new();
/// let ranked = reranker.rerank("React 경험", &documents, 5).await?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapReranker;

impl TermOverlapReranker {
    /// Create a new term-overlap reranker.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reranker for TermOverlapReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankResult>> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = {
            let mut terms: Vec<&str> = query_lower.split_whitespace().collect();
            terms.sort_unstable();
            terms.dedup();
            terms
        };

        let mut ranked: Vec<RerankResult> = documents
            .iter()
            .enumerate()
            .map(|(index, document)| {
                let document_lower = document.to_lowercase();
                let overlap = terms.iter().filter(|term| document_lower.contains(**term)).count();
                let relevance_score = overlap as f32 / terms.len().max(1) as f32;
                RerankResult { index, relevance_score }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(top_n);
        Ok(ranked)
    }
}

/// Apply a reranker to scored candidates, falling back to the original
/// order if it fails.
///
/// On success the candidates are reordered as the reranker directed and
/// their `score` is replaced with the reranker's relevance score. On any
/// error the pre-rerank order is kept with scores untouched. Either way at
/// most `top_k` results are returned and the call itself never fails.
pub async fn rerank_with_fallback(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<SearchResult>,
    top_k: usize,
) -> Vec<SearchResult> {
    if candidates.is_empty() {
        return candidates;
    }

    let documents: Vec<String> =
        candidates.iter().map(|result| result.chunk.text.clone()).collect();

    match reranker.rerank(query, &documents, top_k).await {
        Ok(ranked) => {
            let mut slots: Vec<Option<SearchResult>> =
                candidates.into_iter().map(Some).collect();
            let mut reordered = Vec::with_capacity(ranked.len().min(top_k));
            for entry in ranked {
                if reordered.len() == top_k {
                    break;
                }
                let Some(slot) = slots.get_mut(entry.index) else {
                    warn!(index = entry.index, "reranker returned an out-of-range index");
                    continue;
                };
                if let Some(mut hit) = slot.take() {
                    hit.score = entry.relevance_score;
                    reordered.push(hit);
                }
            }
            reordered
        }
        Err(error) => {
            warn!(error = %error, "reranking failed, keeping pre-rerank order");
            let mut kept = candidates;
            kept.truncate(top_k);
            kept
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;
    use crate::document::{Chunk, ChunkKind, DocumentType};
    use crate::error::RetrievalError;

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(
            &self,
            _query: &str,
            _documents: &[String],
            _top_n: usize,
        ) -> Result<Vec<RerankResult>> {
            Err(RetrievalError::RerankerError {
                reranker: "failing".to_string(),
                message: "service unavailable".to_string(),
            })
        }
    }

    fn result_with_text(id: &str, text: &str, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: id.to_string(),
                owner_id: "u1".to_string(),
                doc_type: DocumentType::Resume,
                filename: "resume.txt".to_string(),
                text: text.to_string(),
                embedding: vec![1.0],
                parent_document_id: None,
                index: 0,
                total: 1,
                section: None,
                kind: ChunkKind::Content,
                char_count: text.chars().count(),
                token_estimate: 1,
                metadata: HashMap::new(),
                created_at: Utc::now(),
            },
            score,
            vector_score: score,
            bm25_score: 0.0,
            highlights: Vec::new(),
        }
    }

    #[tokio::test]
    async fn term_overlap_scores_by_query_term_fraction() {
        let reranker = TermOverlapReranker::new();
        let documents = vec![
            "rust ownership and borrowing".to_string(),
            "rust without the other term".to_string(),
            "nothing relevant here".to_string(),
        ];
        let ranked = reranker.rerank("rust ownership", &documents, 10).await.unwrap();
        assert_eq!(ranked[0].index, 0);
        assert_eq!(ranked[0].relevance_score, 1.0);
        assert_eq!(ranked[1].index, 1);
        assert_eq!(ranked[1].relevance_score, 0.5);
    }

    #[tokio::test]
    async fn fallback_reorders_and_rescores_on_success() {
        let candidates = vec![
            result_with_text("a", "irrelevant text", 0.9),
            result_with_text("b", "rust ownership explained", 0.1),
        ];
        let reranked =
            rerank_with_fallback(&TermOverlapReranker::new(), "rust ownership", candidates, 2)
                .await;
        assert_eq!(reranked[0].chunk.id, "b");
        assert_eq!(reranked[0].score, 1.0);
    }

    #[tokio::test]
    async fn fallback_keeps_original_order_on_error() {
        let candidates = vec![
            result_with_text("a", "first", 0.9),
            result_with_text("b", "second", 0.8),
            result_with_text("c", "third", 0.7),
        ];
        let reranked = rerank_with_fallback(&FailingReranker, "query", candidates, 2).await;
        assert_eq!(reranked.len(), 2);
        assert_eq!(reranked[0].chunk.id, "a");
        assert_eq!(reranked[0].score, 0.9);
        assert_eq!(reranked[1].chunk.id, "b");
    }

    #[tokio::test]
    async fn fallback_handles_empty_candidates() {
        let reranked =
            rerank_with_fallback(&TermOverlapReranker::new(), "query", Vec::new(), 5).await;
        assert!(reranked.is_empty());
    }
}
