//! Search weight tuning.
//!
//! The [`WeightTuner`] sweeps hybrid weight configurations against an
//! evaluation query set and ranks them by a combined quality score, so the
//! vector/BM25 balance and the reranker toggle can be chosen from data
//! instead of guesswork. Typical flow:
//!
//! ```rust,ignore
//! let tuner = WeightTuner::new(pipeline.clone());
//! let queries = harness.synthesize_queries("user-1", EvaluationHarness::DEFAULT_SAMPLE).await?;
//! let report = tuner.tune("user-1", &queries, None).await?;
//! println!("best config: {:?}", report.best.config);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SearchConfig;
use crate::document::DocumentType;
use crate::error::{Result, RetrievalError};
use crate::evaluation::{EvaluationHarness, EvaluationMetrics, EvaluationQuery};
use crate::pipeline::RetrievalPipeline;

/// Vector weights tried during tuning. BM25 weight is the complement, so
/// every candidate keeps `vector_weight + bm25_weight = 1.0`.
pub const VECTOR_WEIGHT_SWEEP: [f32; 6] = [0.3, 0.4, 0.5, 0.6, 0.7, 0.8];

/// Result depth used while tuning.
pub const TUNING_TOP_K: usize = 5;

/// Relative importance of each metric in the combined tuning score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight of precision@k.
    pub precision: f64,
    /// Weight of recall@k.
    pub recall: f64,
    /// Weight of mean reciprocal rank.
    pub mrr: f64,
    /// Weight of normalized discounted cumulative gain.
    pub ndcg: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { precision: 0.3, recall: 0.2, mrr: 0.2, ndcg: 0.3 }
    }
}

impl ScoreWeights {
    /// Collapse a metric set into one comparable score.
    pub fn combine(&self, metrics: &EvaluationMetrics) -> f64 {
        self.precision * metrics.precision
            + self.recall * metrics.recall
            + self.mrr * metrics.mrr
            + self.ndcg * metrics.ndcg
    }
}

/// One evaluated configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningCandidate {
    /// The search configuration that was evaluated.
    pub config: SearchConfig,
    /// Metrics measured under that configuration.
    pub metrics: EvaluationMetrics,
    /// Weighted combination of the metrics, higher is better.
    pub combined_score: f64,
}

/// Outcome of a tuning sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningReport {
    /// The highest-scoring candidate.
    pub best: TuningCandidate,
    /// All evaluated candidates, best first.
    pub candidates: Vec<TuningCandidate>,
}

impl fmt::Display for TuningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tuning report ({} candidates):", self.candidates.len())?;
        for candidate in &self.candidates {
            writeln!(
                f,
                "  vector={:.1} bm25={:.1} rerank={} score={:.4}",
                candidate.config.vector_weight,
                candidate.config.bm25_weight,
                candidate.config.use_reranker,
                candidate.combined_score,
            )?;
        }
        write!(
            f,
            "best: vector={:.1} rerank={}",
            self.best.config.vector_weight, self.best.config.use_reranker
        )
    }
}

/// Sweeps search configurations and ranks them by evaluation quality.
pub struct WeightTuner {
    harness: EvaluationHarness,
    score_weights: ScoreWeights,
}

impl WeightTuner {
    /// Create a tuner evaluating through the given pipeline.
    pub fn new(pipeline: Arc<RetrievalPipeline>) -> Self {
        Self { harness: EvaluationHarness::new(pipeline), score_weights: ScoreWeights::default() }
    }

    /// Override the metric weighting used to rank candidates.
    pub fn with_score_weights(mut self, score_weights: ScoreWeights) -> Self {
        self.score_weights = score_weights;
        self
    }

    /// Evaluate every swept configuration and rank the results.
    ///
    /// Tries each vector weight in [`VECTOR_WEIGHT_SWEEP`] with the
    /// complementary BM25 weight, both with and without reranking, at
    /// `top_k = 5`. The report lists all candidates sorted by combined
    /// score, best first.
    ///
    /// # Errors
    ///
    /// Propagates evaluation failures, including
    /// [`RetrievalError::GroundTruthError`] for an empty query set.
    pub async fn tune(
        &self,
        owner_id: &str,
        queries: &[EvaluationQuery],
        type_filter: Option<&[DocumentType]>,
    ) -> Result<TuningReport> {
        let mut candidates = Vec::with_capacity(VECTOR_WEIGHT_SWEEP.len() * 2);

        for vector_weight in VECTOR_WEIGHT_SWEEP {
            for use_reranker in [false, true] {
                let config = SearchConfig {
                    vector_weight,
                    bm25_weight: 1.0 - vector_weight,
                    use_reranker,
                    top_k: TUNING_TOP_K,
                };
                let metrics = self.harness.evaluate(owner_id, queries, &config, type_filter).await?;
                let combined_score = self.score_weights.combine(&metrics);
                info!(
                    vector_weight,
                    use_reranker, combined_score, "evaluated tuning candidate"
                );
                candidates.push(TuningCandidate { config, metrics, combined_score });
            }
        }

        candidates.sort_by(|a, b| {
            b.combined_score.partial_cmp(&a.combined_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        let best = candidates
            .first()
            .cloned()
            .ok_or_else(|| RetrievalError::PipelineError("tuning produced no candidates".into()))?;

        info!(
            owner_id,
            best_vector_weight = best.config.vector_weight,
            best_use_reranker = best.config.use_reranker,
            best_score = best.combined_score,
            "tuning completed"
        );
        Ok(TuningReport { best, candidates })
    }
}
