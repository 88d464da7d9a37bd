//! Retrieval pipeline orchestrator.
//!
//! The [`RetrievalPipeline`] coordinates the full ingest-and-search workflow
//! by composing a [`StructuredChunker`], an [`Embedder`], a [`ChunkStore`],
//! an optional [`Reranker`], and a [`RetrievalMonitor`].
//!
//! # Example
//!
//! ```rust,ignore
//! use interview_rag::{DocumentType, InMemoryStore, RetrievalPipeline, SearchConfig};
//!
//! let pipeline = RetrievalPipeline::builder()
//!     .embedder(Arc::new(my_embedder))
//!     .store(Arc::new(InMemoryStore::new()))
//!     .build()?;
//!
//! let document = pipeline
//!     .ingest("user-1", DocumentType::Resume, "resume.txt", &text, HashMap::new())
//!     .await?;
//! let results = pipeline.search("React 경험", "user-1", None, None).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunking::StructuredChunker;
use crate::config::SearchConfig;
use crate::document::{Chunk, Document, DocumentSource, DocumentType, SearchResult};
use crate::embedding::Embedder;
use crate::error::{Result, RetrievalError};
use crate::highlight::extract_highlights;
use crate::monitor::{RetrievalLogEntry, RetrievalMonitor};
use crate::reranker::{Reranker, rerank_with_fallback};
use crate::store::ChunkStore;

/// Similarity floor applied by the vector-only fallback search.
pub const FALLBACK_SIMILARITY_THRESHOLD: f32 = 0.5;

/// Candidates fetched from the store per search, as a multiple of `top_k`.
/// The overfetch leaves room for the type filter and the reranker to drop
/// candidates without starving the final result list.
const CANDIDATE_MULTIPLIER: usize = 2;

/// Leading characters used for a context block when a result has no
/// highlights.
const CONTEXT_PREVIEW_CHARS: usize = 200;

/// The retrieval pipeline orchestrator.
///
/// Coordinates document ingestion (chunk → embed → store) and search
/// execution (embed → hybrid search → filter → rerank → highlight), and
/// records every search in the [`RetrievalMonitor`]. Construct one via
/// [`RetrievalPipeline::builder()`].
pub struct RetrievalPipeline {
    config: SearchConfig,
    chunker: StructuredChunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ChunkStore>,
    reranker: Option<Arc<dyn Reranker>>,
    monitor: Arc<RetrievalMonitor>,
}

impl RetrievalPipeline {
    /// Create a new [`RetrievalPipelineBuilder`].
    pub fn builder() -> RetrievalPipelineBuilder {
        RetrievalPipelineBuilder::default()
    }

    /// Return a reference to the default search configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Return a reference to the embedder.
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Return a reference to the chunk store.
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Return a reference to the retrieval monitor.
    pub fn monitor(&self) -> &Arc<RetrievalMonitor> {
        &self.monitor
    }

    /// Ingest a document: chunk → embed → persist.
    ///
    /// The document is chunked with the configured chunker, every chunk is
    /// embedded in one batch, and the rows are persisted in a single atomic
    /// store call. Multi-chunk documents share a generated
    /// `parent_document_id`; single-chunk documents store one row with no
    /// parent. The returned [`Document`] carries the first chunk's id as the
    /// document id plus the ids of all persisted chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::PipelineError`] when the content produces
    /// no chunks, and propagates embedding and store failures. On any error
    /// nothing is persisted.
    pub async fn ingest(
        &self,
        owner_id: &str,
        doc_type: DocumentType,
        filename: &str,
        content: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Document> {
        // 1. Chunk the document
        let drafts = self.chunker.chunk(content);
        if drafts.is_empty() {
            return Err(RetrievalError::PipelineError(format!(
                "document '{filename}' produced no chunks"
            )));
        }

        // 2. Embed every chunk in one batch
        let texts: Vec<&str> = drafts.iter().map(|draft| draft.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.map_err(|e| {
            error!(owner_id, filename, error = %e, "embedding failed during ingestion");
            e
        })?;
        if embeddings.len() != drafts.len() {
            return Err(RetrievalError::EmbeddingError {
                provider: "batch".to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    drafts.len(),
                    embeddings.len()
                ),
            });
        }

        // 3. Assemble chunk rows
        let parent_document_id = (drafts.len() > 1).then(|| Uuid::new_v4().to_string());
        let created_at = Utc::now();
        let mut metadata = metadata;
        metadata.insert("chunk_count".to_string(), drafts.len().to_string());

        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .zip(embeddings)
            .map(|(draft, embedding)| Chunk {
                id: Uuid::new_v4().to_string(),
                owner_id: owner_id.to_string(),
                doc_type,
                filename: filename.to_string(),
                text: draft.text,
                embedding,
                parent_document_id: parent_document_id.clone(),
                index: draft.index,
                total: draft.total,
                section: draft.section,
                kind: draft.kind,
                char_count: draft.char_count,
                token_estimate: draft.token_estimate,
                metadata: metadata.clone(),
                created_at,
            })
            .collect();

        // 4. Persist all rows in one atomic call
        self.store.insert_chunks(&chunks).await.map_err(|e| {
            error!(owner_id, filename, error = %e, "persist failed during ingestion");
            e
        })?;

        let chunk_count = chunks.len();
        info!(owner_id, filename, chunk_count, "ingested document");

        let first = &chunks[0];
        Ok(Document {
            id: first.id.clone(),
            owner_id: first.owner_id.clone(),
            doc_type,
            filename: first.filename.clone(),
            text: first.text.clone(),
            metadata: first.metadata.clone(),
            created_at,
            chunk_ids: chunks.iter().map(|chunk| chunk.id.clone()).collect(),
        })
    }

    /// Ingest several documents for one owner, in slice order.
    ///
    /// # Errors
    ///
    /// Stops at the first [`ingest`](Self::ingest) failure and propagates
    /// it. Documents ingested before the failure stay persisted.
    pub async fn ingest_batch(
        &self,
        owner_id: &str,
        sources: &[DocumentSource],
    ) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(sources.len());
        for source in sources {
            let document = self
                .ingest(
                    owner_id,
                    source.doc_type,
                    &source.filename,
                    &source.content,
                    source.metadata.clone(),
                )
                .await?;
            documents.push(document);
        }
        Ok(documents)
    }

    /// Search an owner's chunks.
    ///
    /// Runs the hybrid vector+BM25 query, falling back to vector-only
    /// search (with a similarity floor of
    /// [`FALLBACK_SIMILARITY_THRESHOLD`]) if the hybrid query fails.
    /// Candidates are filtered by `type_filter`, optionally reranked, and
    /// truncated to `top_k`, and every returned result carries highlight
    /// snippets. The retrieval is recorded in the monitor, including
    /// zero-result searches.
    ///
    /// `config` overrides the pipeline default for this call only.
    /// Reranking runs only when the effective config enables it and a
    /// reranker is configured; a reranker failure keeps the pre-rerank
    /// order instead of failing the search.
    ///
    /// # Errors
    ///
    /// Propagates query-embedding failures, and search failures only when
    /// the vector-only fallback also fails.
    pub async fn search(
        &self,
        query: &str,
        owner_id: &str,
        type_filter: Option<&[DocumentType]>,
        config: Option<&SearchConfig>,
    ) -> Result<Vec<SearchResult>> {
        let config = config.unwrap_or(&self.config);

        // 1. Embed the query
        let query_embedding = self.embedder.embed(query).await.map_err(|e| {
            error!(owner_id, error = %e, "embedding failed during search");
            e
        })?;

        // 2. Fetch candidates, falling back to vector-only on hybrid failure
        let match_count = config.top_k * CANDIDATE_MULTIPLIER;
        let candidates = match self
            .store
            .hybrid_search(
                owner_id,
                &query_embedding,
                query,
                match_count,
                config.vector_weight,
                config.bm25_weight,
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(owner_id, error = %e, "hybrid search failed, retrying vector-only");
                self.store
                    .vector_search(
                        owner_id,
                        &query_embedding,
                        FALLBACK_SIMILARITY_THRESHOLD,
                        match_count,
                    )
                    .await?
            }
        };

        // 3. Apply the document type filter
        let results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|candidate| {
                type_filter.is_none_or(|types| types.contains(&candidate.chunk.doc_type))
            })
            .map(|candidate| SearchResult {
                score: candidate.combined_score,
                vector_score: candidate.vector_score,
                bm25_score: candidate.bm25_score,
                highlights: Vec::new(),
                chunk: candidate.chunk,
            })
            .collect();

        // 4. Rerank when enabled, otherwise truncate to top_k
        let mut results = match &self.reranker {
            Some(reranker) if config.use_reranker => {
                rerank_with_fallback(reranker.as_ref(), query, results, config.top_k).await
            }
            _ => {
                let mut results = results;
                results.truncate(config.top_k);
                results
            }
        };

        // 5. Attach highlights
        for result in &mut results {
            result.highlights = extract_highlights(&result.chunk.text, query);
        }

        // 6. Record the retrieval
        self.record(query, &results, config);

        info!(owner_id, result_count = results.len(), "search completed");
        Ok(results)
    }

    /// Search and format the results as a context string for prompt
    /// assembly.
    ///
    /// Each result becomes a block headed by its document type and section
    /// label, followed by the highlights (or the chunk's leading characters
    /// when no term matched). Blocks are separated by blank lines. An empty
    /// result set yields an empty string.
    pub async fn context_for_query(&self, owner_id: &str, query: &str) -> Result<String> {
        let results = self.search(query, owner_id, None, None).await?;

        let blocks: Vec<String> = results
            .iter()
            .map(|result| {
                let heading = match &result.chunk.section {
                    Some(section) => format!("[{} · {}]", result.chunk.doc_type, section),
                    None => format!("[{}]", result.chunk.doc_type),
                };
                let body: String = if result.highlights.is_empty() {
                    result.chunk.text.chars().take(CONTEXT_PREVIEW_CHARS).collect()
                } else {
                    result.highlights.join(" ")
                };
                format!("{heading}\n{body}")
            })
            .collect();

        Ok(blocks.join("\n\n"))
    }

    /// Delete a document and all chunks derived from it.
    ///
    /// Returns `false` when the id does not exist for this owner.
    pub async fn delete_document(&self, document_id: &str, owner_id: &str) -> Result<bool> {
        let deleted = self.store.delete_document(document_id, owner_id).await?;
        if deleted {
            info!(owner_id, document_id, "deleted document");
        }
        Ok(deleted)
    }

    /// Replace a document's content, re-chunking and re-embedding it.
    ///
    /// The replacement is ingested before the old rows are deleted, so a
    /// failed ingest leaves the previous version in place. Identity fields
    /// (owner, type, filename, metadata) carry over from the old document.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::PipelineError`] when `document_id` does
    /// not exist for this owner.
    pub async fn update_document(
        &self,
        document_id: &str,
        owner_id: &str,
        content: &str,
    ) -> Result<Document> {
        let existing =
            self.store.get_chunk(document_id, owner_id).await?.ok_or_else(|| {
                RetrievalError::PipelineError(format!(
                    "document '{document_id}' not found for owner '{owner_id}'"
                ))
            })?;

        let mut metadata = existing.metadata.clone();
        metadata.remove("chunk_count");
        let document =
            self.ingest(owner_id, existing.doc_type, &existing.filename, content, metadata).await?;
        self.store.delete_document(document_id, owner_id).await?;

        info!(owner_id, document_id, replacement_id = %document.id, "updated document");
        Ok(document)
    }

    fn record(&self, query: &str, results: &[SearchResult], config: &SearchConfig) {
        let top_score = results.first().map_or(0.0, |result| result.score);
        let mean_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|result| result.score).sum::<f32>() / results.len() as f32
        };
        self.monitor.record(RetrievalLogEntry {
            timestamp: Utc::now(),
            query: query.to_string(),
            top_score,
            mean_score,
            result_count: results.len(),
            config: config.clone(),
        });
    }
}

/// Builder for constructing a [`RetrievalPipeline`].
///
/// `embedder` and `store` are required; the chunker, search configuration,
/// and monitor fall back to defaults, and the reranker stays absent unless
/// set. Call [`build()`](RetrievalPipelineBuilder::build) to validate and
/// produce the pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RetrievalPipeline::builder()
///     .embedder(Arc::new(embedder))
///     .store(Arc::new(store))
///     .reranker(Arc::new(reranker))  // optional
///     .config(SearchConfig::builder().top_k(8).build()?)
///     .build()?;
/// ```
#[derive(Default)]
pub struct RetrievalPipelineBuilder {
    config: Option<SearchConfig>,
    chunker: Option<StructuredChunker>,
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn ChunkStore>>,
    reranker: Option<Arc<dyn Reranker>>,
    monitor: Option<Arc<RetrievalMonitor>>,
}

impl RetrievalPipelineBuilder {
    /// Set the default search configuration.
    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: StructuredChunker) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the chunk store backend.
    pub fn store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set an optional reranker for post-search result reordering.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the retrieval monitor. Useful for sharing one monitor across
    /// pipelines or for injecting a smaller capacity in tests.
    pub fn monitor(mut self, monitor: Arc<RetrievalMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Build the [`RetrievalPipeline`], validating that required fields are
    /// set.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if `embedder` or `store` is
    /// missing.
    pub fn build(self) -> Result<RetrievalPipeline> {
        let embedder = self
            .embedder
            .ok_or_else(|| RetrievalError::ConfigError("embedder is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| RetrievalError::ConfigError("store is required".to_string()))?;

        Ok(RetrievalPipeline {
            config: self.config.unwrap_or_default(),
            chunker: self.chunker.unwrap_or_default(),
            embedder,
            store,
            reranker: self.reranker,
            monitor: self.monitor.unwrap_or_else(|| Arc::new(RetrievalMonitor::default())),
        })
    }
}
