//! Retrieval quality evaluation.
//!
//! The [`EvaluationHarness`] measures how well search retrieves the chunks
//! a query set marks as relevant, reporting standard ranking metrics:
//!
//! - Precision: proportion of retrieved chunks that are relevant
//! - Recall: proportion of relevant chunks that were retrieved
//! - MRR: mean over queries of 1/rank of the first relevant hit
//! - NDCG: rank-discounted gain against an ideal ordering
//!
//! Query sets can be hand-labeled or synthesized from the stored corpus
//! via [`synthesize_queries`](EvaluationHarness::synthesize_queries), which
//! needs no manual labeling at all.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunking::split_sentences;
use crate::config::SearchConfig;
use crate::document::DocumentType;
use crate::error::{Result, RetrievalError};
use crate::pipeline::RetrievalPipeline;

/// Maximum length of a synthesized query in characters.
const SYNTHETIC_QUERY_CHARS: usize = 100;

/// Paragraphs sampled per document when synthesizing queries.
const PARAGRAPHS_PER_DOCUMENT: usize = 2;

/// A labeled evaluation query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationQuery {
    /// The query text to search with.
    pub query: String,
    /// Ids of the chunks that count as relevant for this query.
    pub relevant_ids: HashSet<String>,
    /// Optional free-text note about where the query came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Averaged retrieval-quality metrics over a query set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Mean proportion of retrieved chunks that were relevant.
    pub precision: f64,
    /// Mean proportion of relevant chunks that were retrieved.
    pub recall: f64,
    /// Mean reciprocal rank of the first relevant hit.
    pub mrr: f64,
    /// Mean normalized discounted cumulative gain.
    pub ndcg: f64,
    /// Mean relevance score across all returned results.
    pub avg_relevance_score: f64,
    /// Number of queries evaluated.
    pub query_count: usize,
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation ({} queries):", self.query_count)?;
        writeln!(f, "  Precision: {:.4}", self.precision)?;
        writeln!(f, "  Recall: {:.4}", self.recall)?;
        writeln!(f, "  MRR: {:.4}", self.mrr)?;
        writeln!(f, "  NDCG: {:.4}", self.ndcg)?;
        write!(f, "  Avg score: {:.4}", self.avg_relevance_score)
    }
}

/// Proportion of retrieved ids that are relevant. Zero when nothing was
/// retrieved.
fn precision(retrieved: &[String], relevant: &HashSet<String>) -> f64 {
    if retrieved.is_empty() {
        return 0.0;
    }
    let hits = retrieved.iter().filter(|id| relevant.contains(*id)).count();
    hits as f64 / retrieved.len() as f64
}

/// Proportion of relevant ids that were retrieved. Zero when the relevant
/// set is empty.
fn recall(retrieved: &[String], relevant: &HashSet<String>) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let hits = retrieved.iter().filter(|id| relevant.contains(*id)).count();
    hits as f64 / relevant.len() as f64
}

/// 1/rank of the first relevant id, zero when none was retrieved.
fn reciprocal_rank(retrieved: &[String], relevant: &HashSet<String>) -> f64 {
    retrieved
        .iter()
        .position(|id| relevant.contains(id))
        .map_or(0.0, |rank| 1.0 / (rank + 1) as f64)
}

/// Normalized discounted cumulative gain with binary relevance.
///
/// The ideal ranking is computed over `min(retrieved, relevant)` positions,
/// so the score reads as ranking quality within the returned window rather
/// than against the full relevant set.
fn ndcg(retrieved: &[String], relevant: &HashSet<String>) -> f64 {
    let dcg: f64 = retrieved
        .iter()
        .enumerate()
        .map(|(i, id)| {
            if relevant.contains(id) { 1.0 / (i as f64 + 2.0).log2() } else { 0.0 }
        })
        .sum();
    let ideal_positions = retrieved.len().min(relevant.len());
    let idcg: f64 = (0..ideal_positions).map(|i| 1.0 / (i as f64 + 2.0).log2()).sum();
    if idcg == 0.0 { 0.0 } else { dcg / idcg }
}

/// Measures retrieval quality through a [`RetrievalPipeline`].
///
/// The harness runs each evaluation query through the pipeline's real
/// search path (same candidate fetch, filtering, and reranking as
/// production) and averages the ranking metrics over the query set.
pub struct EvaluationHarness {
    pipeline: Arc<RetrievalPipeline>,
}

impl EvaluationHarness {
    /// Documents sampled by default when synthesizing an evaluation set.
    pub const DEFAULT_SAMPLE: usize = 10;

    /// Create a harness evaluating through the given pipeline.
    pub fn new(pipeline: Arc<RetrievalPipeline>) -> Self {
        Self { pipeline }
    }

    /// Evaluate a query set under one search configuration.
    ///
    /// Every query runs through [`RetrievalPipeline::search`] with the
    /// given `config` and `type_filter`; metrics are averaged over the
    /// whole set.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::GroundTruthError`] when `queries` is
    /// empty, and propagates search failures.
    pub async fn evaluate(
        &self,
        owner_id: &str,
        queries: &[EvaluationQuery],
        config: &SearchConfig,
        type_filter: Option<&[DocumentType]>,
    ) -> Result<EvaluationMetrics> {
        if queries.is_empty() {
            return Err(RetrievalError::GroundTruthError { owner_id: owner_id.to_string() });
        }

        let mut precision_sum = 0.0;
        let mut recall_sum = 0.0;
        let mut mrr_sum = 0.0;
        let mut ndcg_sum = 0.0;
        let mut score_sum = 0.0;

        for query in queries {
            let results =
                self.pipeline.search(&query.query, owner_id, type_filter, Some(config)).await?;
            let retrieved: Vec<String> =
                results.iter().map(|result| result.chunk.id.clone()).collect();

            precision_sum += precision(&retrieved, &query.relevant_ids);
            recall_sum += recall(&retrieved, &query.relevant_ids);
            mrr_sum += reciprocal_rank(&retrieved, &query.relevant_ids);
            ndcg_sum += ndcg(&retrieved, &query.relevant_ids);
            if !results.is_empty() {
                score_sum += results.iter().map(|r| f64::from(r.score)).sum::<f64>()
                    / results.len() as f64;
            }
            debug!(query = %query.query, retrieved = retrieved.len(), "evaluated query");
        }

        let n = queries.len() as f64;
        let metrics = EvaluationMetrics {
            precision: precision_sum / n,
            recall: recall_sum / n,
            mrr: mrr_sum / n,
            ndcg: ndcg_sum / n,
            avg_relevance_score: score_sum / n,
            query_count: queries.len(),
        };
        info!(owner_id, query_count = queries.len(), "evaluation completed");
        Ok(metrics)
    }

    /// Build an evaluation set from the owner's stored chunks, no manual
    /// labeling required.
    ///
    /// Takes the first `max_documents` stored chunks and, from each, the
    /// first sentence of up to two leading paragraphs, truncated to 100
    /// characters. The source chunk's id is the sole relevant id for each
    /// query, which makes the metrics a self-retrieval check: searching
    /// with a chunk's own opening line should find that chunk.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::GroundTruthError`] when the owner has no
    /// stored chunks.
    pub async fn synthesize_queries(
        &self,
        owner_id: &str,
        max_documents: usize,
    ) -> Result<Vec<EvaluationQuery>> {
        let rows = self.pipeline.store().list_chunks(owner_id, None).await?;
        if rows.is_empty() {
            return Err(RetrievalError::GroundTruthError { owner_id: owner_id.to_string() });
        }

        let mut queries = Vec::new();
        for row in rows.iter().take(max_documents) {
            let paragraphs = row
                .text
                .split("\n\n")
                .filter(|paragraph| !paragraph.trim().is_empty())
                .take(PARAGRAPHS_PER_DOCUMENT);
            for paragraph in paragraphs {
                let Some(first_sentence) = split_sentences(paragraph).into_iter().next() else {
                    continue;
                };
                let query: String =
                    first_sentence.chars().take(SYNTHETIC_QUERY_CHARS).collect();
                queries.push(EvaluationQuery {
                    query,
                    relevant_ids: HashSet::from([row.id.clone()]),
                    context: row.section.clone(),
                });
            }
        }

        if queries.is_empty() {
            return Err(RetrievalError::GroundTruthError { owner_id: owner_id.to_string() });
        }
        info!(owner_id, query_count = queries.len(), "synthesized evaluation queries");
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn relevant(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn precision_counts_relevant_fraction_of_retrieved() {
        let retrieved = ids(&["a", "b", "c", "d"]);
        assert_eq!(precision(&retrieved, &relevant(&["a", "c"])), 0.5);
        assert_eq!(precision(&[], &relevant(&["a"])), 0.0);
    }

    #[test]
    fn recall_counts_retrieved_fraction_of_relevant() {
        let retrieved = ids(&["a", "b"]);
        assert_eq!(recall(&retrieved, &relevant(&["a", "c", "d", "e"])), 0.25);
        assert_eq!(recall(&retrieved, &HashSet::new()), 0.0);
    }

    #[test]
    fn reciprocal_rank_finds_first_hit() {
        let retrieved = ids(&["x", "y", "a"]);
        assert!((reciprocal_rank(&retrieved, &relevant(&["a"])) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(reciprocal_rank(&retrieved, &relevant(&["z"])), 0.0);
    }

    #[test]
    fn ndcg_is_one_for_perfect_ranking() {
        let retrieved = ids(&["a", "b", "x"]);
        let score = ndcg(&retrieved, &relevant(&["a", "b"]));
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ndcg_discounts_late_hits() {
        let early = ndcg(&ids(&["a", "x", "y"]), &relevant(&["a"]));
        let late = ndcg(&ids(&["x", "y", "a"]), &relevant(&["a"]));
        assert_eq!(early, 1.0);
        assert!(late < early);
        assert!(late > 0.0);
    }

    #[test]
    fn ndcg_ideal_window_follows_retrieved_length() {
        // One hit at rank 1, three relevant in total, two retrieved: the
        // ideal covers min(2, 3) = 2 positions.
        let score = ndcg(&ids(&["a", "x"]), &relevant(&["a", "b", "c"]));
        let expected = 1.0 / ((1.0f64 / 2.0f64.log2()) + (1.0 / 3.0f64.log2()));
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn ndcg_is_zero_without_relevant_ids() {
        assert_eq!(ndcg(&ids(&["a"]), &HashSet::new()), 0.0);
        assert_eq!(ndcg(&[], &relevant(&["a"])), 0.0);
    }

    #[test]
    fn metrics_display_is_readable() {
        let metrics = EvaluationMetrics {
            precision: 0.25,
            recall: 1.0,
            mrr: 0.5,
            ndcg: 0.75,
            avg_relevance_score: 0.6,
            query_count: 4,
        };
        let text = metrics.to_string();
        assert!(text.contains("Evaluation (4 queries):"));
        assert!(text.contains("Precision: 0.2500"));
        assert!(text.contains("NDCG: 0.7500"));
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(100))]

        #[test]
        fn metrics_stay_in_unit_range(
            retrieved_count in 0usize..8,
            relevant_mask in proptest::collection::vec(proptest::bool::ANY, 12),
        ) {
            let retrieved: Vec<String> =
                (0..retrieved_count).map(|i| format!("id-{i}")).collect();
            let relevant: HashSet<String> = relevant_mask
                .iter()
                .enumerate()
                .filter_map(|(i, keep)| keep.then(|| format!("id-{i}")))
                .collect();

            for metric in [
                precision(&retrieved, &relevant),
                recall(&retrieved, &relevant),
                reciprocal_rank(&retrieved, &relevant),
                ndcg(&retrieved, &relevant),
            ] {
                proptest::prop_assert!((0.0..=1.0).contains(&metric));
            }
        }
    }
}
