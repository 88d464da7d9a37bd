//! # interview-rag
//!
//! Hybrid retrieval core for interview preparation: structure-aware
//! chunking, vector + BM25 search, reranking, and self-evaluation.
//!
//! ## Overview
//!
//! Users upload personal documents (resumes, portfolios, company research,
//! job descriptions), and interview answers are grounded in passages
//! retrieved from them. This crate covers the whole retrieval loop:
//!
//! - [`StructuredChunker`] - splits Korean self-introduction documents
//!   along their section headers before falling back to size-based packing
//! - [`RetrievalPipeline`] - ingestion and hybrid search over pluggable
//!   [`Embedder`] / [`ChunkStore`] / [`Reranker`] backends
//! - [`EvaluationHarness`] / [`WeightTuner`] - measure retrieval quality
//!   and pick hybrid weights from data, with queries synthesized from the
//!   corpus itself
//! - [`RetrievalMonitor`] - rolling log of live search quality that flags
//!   when retuning is due
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use interview_rag::{DocumentType, InMemoryStore, RetrievalPipeline};
//!
//! let pipeline = Arc::new(
//!     RetrievalPipeline::builder()
//!         .embedder(Arc::new(embedder))
//!         .store(Arc::new(InMemoryStore::new()))
//!         .build()?,
//! );
//!
//! pipeline
//!     .ingest("user-1", DocumentType::Resume, "resume.txt", &content, HashMap::new())
//!     .await?;
//! let results = pipeline.search("백엔드 프로젝트 경험", "user-1", None, None).await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Adds |
//! |---------|------|
//! | `openai` | [`OpenAIEmbedder`](openai::OpenAIEmbedder) backed by the OpenAI embeddings API |
//! | `cohere` | [`CohereReranker`](cohere::CohereReranker) backed by the Cohere v2 rerank API |
//! | `pgvector` | [`PgVectorStore`](pgvector::PgVectorStore) on PostgreSQL with pgvector |
//!
//! All features are off by default; the in-memory store and the
//! [`TermOverlapReranker`] work without any of them.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod highlight;
pub mod inmemory;
pub mod monitor;
pub mod pipeline;
pub mod reranker;
pub mod store;
pub mod tuning;

#[cfg(feature = "cohere")]
pub mod cohere;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pgvector")]
pub mod pgvector;

pub use chunking::{
    ChunkDraft, KoreanSectionMatcher, SectionBoundary, SectionMatcher, StructuredChunker,
    normalize_text, split_sentences,
};
pub use config::{ChunkConfig, ChunkConfigBuilder, SearchConfig, SearchConfigBuilder};
pub use document::{
    Chunk, ChunkKind, Document, DocumentSource, DocumentType, ScoredChunk, SearchResult,
};
pub use embedding::Embedder;
pub use error::{Result, RetrievalError};
pub use evaluation::{EvaluationHarness, EvaluationMetrics, EvaluationQuery};
pub use highlight::extract_highlights;
pub use inmemory::InMemoryStore;
pub use monitor::{
    DEFAULT_RETUNE_THRESHOLD, LOW_QUALITY_SCORE, MonitorSnapshot, RETUNE_WINDOW,
    RetrievalLogEntry, RetrievalMonitor,
};
pub use pipeline::{
    FALLBACK_SIMILARITY_THRESHOLD, RetrievalPipeline, RetrievalPipelineBuilder,
};
pub use reranker::{RerankResult, Reranker, TermOverlapReranker, rerank_with_fallback};
pub use store::ChunkStore;
pub use tuning::{
    ScoreWeights, TuningCandidate, TuningReport, VECTOR_WEIGHT_SWEEP, WeightTuner,
};

#[cfg(feature = "cohere")]
pub use cohere::CohereReranker;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbedder;
#[cfg(feature = "pgvector")]
pub use pgvector::PgVectorStore;
