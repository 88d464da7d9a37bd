//! Configuration for search blending and chunking.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Configuration parameters for a hybrid search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Weight of the vector similarity signal in the combined score.
    pub vector_weight: f32,
    /// Weight of the lexical (BM25) signal in the combined score.
    pub bm25_weight: f32,
    /// Whether to rerank candidates before truncating to `top_k`.
    pub use_reranker: bool,
    /// Maximum number of results returned by a search.
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { vector_weight: 0.7, bm25_weight: 0.3, use_reranker: false, top_k: 5 }
    }
}

impl SearchConfig {
    /// Create a new builder for constructing a [`SearchConfig`].
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`SearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Set the weight of the vector similarity signal.
    pub fn vector_weight(mut self, weight: f32) -> Self {
        self.config.vector_weight = weight;
        self
    }

    /// Set the weight of the lexical signal.
    pub fn bm25_weight(mut self, weight: f32) -> Self {
        self.config.bm25_weight = weight;
        self
    }

    /// Set whether candidates are reranked before truncation.
    pub fn use_reranker(mut self, enabled: bool) -> Self {
        self.config.use_reranker = enabled;
        self
    }

    /// Set the maximum number of results returned by a search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Build the [`SearchConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if:
    /// - either weight is negative or not finite
    /// - both weights are zero
    /// - `top_k == 0`
    pub fn build(self) -> Result<SearchConfig> {
        for (name, weight) in
            [("vector_weight", self.config.vector_weight), ("bm25_weight", self.config.bm25_weight)]
        {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RetrievalError::ConfigError(format!(
                    "{name} ({weight}) must be a non-negative finite number"
                )));
            }
        }
        if self.config.vector_weight == 0.0 && self.config.bm25_weight == 0.0 {
            return Err(RetrievalError::ConfigError(
                "at least one of vector_weight and bm25_weight must be positive".to_string(),
            ));
        }
        if self.config.top_k == 0 {
            return Err(RetrievalError::ConfigError("top_k must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}

/// Sizing parameters for the structure-aware chunker.
///
/// All sizes are in characters, not bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkConfig {
    /// Maximum chunk size in characters.
    pub max_chunk_size: usize,
    /// Minimum chunk size in characters, honored unless closing early is
    /// the only way to respect the maximum.
    pub min_chunk_size: usize,
    /// Number of overlapping characters carried between consecutive chunks.
    pub overlap_size: usize,
    /// Characters per token used by the token estimate.
    pub chars_per_token: f32,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { max_chunk_size: 800, min_chunk_size: 100, overlap_size: 100, chars_per_token: 2.5 }
    }
}

impl ChunkConfig {
    /// Create a new builder for constructing a [`ChunkConfig`].
    pub fn builder() -> ChunkConfigBuilder {
        ChunkConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`ChunkConfig`].
#[derive(Debug, Clone, Default)]
pub struct ChunkConfigBuilder {
    config: ChunkConfig,
}

impl ChunkConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    /// Set the minimum chunk size in characters.
    pub fn min_chunk_size(mut self, size: usize) -> Self {
        self.config.min_chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn overlap_size(mut self, size: usize) -> Self {
        self.config.overlap_size = size;
        self
    }

    /// Set the characters-per-token ratio used by the token estimate.
    pub fn chars_per_token(mut self, ratio: f32) -> Self {
        self.config.chars_per_token = ratio;
        self
    }

    /// Build the [`ChunkConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if:
    /// - `min_chunk_size >= max_chunk_size`
    /// - `overlap_size >= max_chunk_size`
    /// - `chars_per_token` is not a positive finite number
    pub fn build(self) -> Result<ChunkConfig> {
        if self.config.min_chunk_size >= self.config.max_chunk_size {
            return Err(RetrievalError::ConfigError(format!(
                "min_chunk_size ({}) must be less than max_chunk_size ({})",
                self.config.min_chunk_size, self.config.max_chunk_size
            )));
        }
        if self.config.overlap_size >= self.config.max_chunk_size {
            return Err(RetrievalError::ConfigError(format!(
                "overlap_size ({}) must be less than max_chunk_size ({})",
                self.config.overlap_size, self.config.max_chunk_size
            )));
        }
        if !self.config.chars_per_token.is_finite() || self.config.chars_per_token <= 0.0 {
            return Err(RetrievalError::ConfigError(format!(
                "chars_per_token ({}) must be a positive finite number",
                self.config.chars_per_token
            )));
        }
        Ok(self.config)
    }
}
