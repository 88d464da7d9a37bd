//! Cohere reranker using the Cohere v2 rerank API.
//!
//! This module is only available when the `cohere` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{Result, RetrievalError};
use crate::reranker::{Reranker, RerankResult};

/// The Cohere v2 rerank endpoint.
const COHERE_RERANK_URL: &str = "https://api.cohere.com/v2/rerank";

/// The default rerank model.
const DEFAULT_MODEL: &str = "rerank-v3.5";

/// A [`Reranker`] backed by the Cohere v2 rerank API.
///
/// Scores every candidate document against the query with a cross-encoder
/// and returns the `top_n` highest-scoring indices. Search never fails on a
/// rerank error because the pipeline routes all reranking through
/// [`rerank_with_fallback`](crate::reranker::rerank_with_fallback).
///
/// # Example
///
/// ```rust,ignore
/// use interview_rag::cohere::CohereReranker;
///
/// let reranker = CohereReranker::from_env()?;
/// let reranked = reranker.rerank("팀워크 경험", &documents, 5).await?;
/// ```
pub struct CohereReranker {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl CohereReranker {
    /// Create a new reranker with the given API key.
    ///
    /// Uses the default model (`rerank-v3.5`).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RetrievalError::RerankerError {
                reranker: "Cohere".into(),
                message: "API key must not be empty".into(),
            });
        }

        Ok(Self { client: reqwest::Client::new(), api_key, model: DEFAULT_MODEL.into() })
    }

    /// Create a new reranker using the `COHERE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("COHERE_API_KEY").map_err(|_| RetrievalError::RerankerError {
                reranker: "Cohere".into(),
                message: "COHERE_API_KEY environment variable not set".into(),
            })?;
        Self::new(api_key)
    }

    /// Set the model name (e.g. `rerank-multilingual-v3.0`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

// ── Cohere API request/response types ──────────────────────────────

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

// ── Reranker implementation ────────────────────────────────────────

#[async_trait]
impl Reranker for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankResult>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            reranker = "Cohere",
            document_count = documents.len(),
            model = %self.model,
            "reranking candidates"
        );

        let request_body = RerankRequest { model: &self.model, query, documents, top_n };

        let response = self
            .client
            .post(COHERE_RERANK_URL)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(reranker = "Cohere", error = %e, "request failed");
                RetrievalError::RerankerError {
                    reranker: "Cohere".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.message).unwrap_or(body);

            error!(reranker = "Cohere", %status, "API error");
            return Err(RetrievalError::RerankerError {
                reranker: "Cohere".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let rerank_response: RerankResponse = response.json().await.map_err(|e| {
            error!(reranker = "Cohere", error = %e, "failed to parse response");
            RetrievalError::RerankerError {
                reranker: "Cohere".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        let mut results = rerank_response.results;
        results.sort_by(|a, b| {
            b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_n);
        Ok(results)
    }
}
