//! Data types for documents, chunks, and search results.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of personal document a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// A resume or CV.
    Resume,
    /// A portfolio or project write-up.
    Portfolio,
    /// Research notes about a target company.
    Company,
    /// A job description the user is preparing for.
    JobDescription,
}

impl DocumentType {
    /// The stable string form used by store backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Resume => "resume",
            DocumentType::Portfolio => "portfolio",
            DocumentType::Company => "company",
            DocumentType::JobDescription => "job_description",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resume" => Ok(DocumentType::Resume),
            "portfolio" => Ok(DocumentType::Portfolio),
            "company" => Ok(DocumentType::Company),
            "job_description" => Ok(DocumentType::JobDescription),
            other => Err(format!("unknown document type '{other}'")),
        }
    }
}

/// Whether a chunk holds a section header, body content, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// The chunk is exactly a section header line.
    Header,
    /// The chunk is body text.
    Content,
    /// The chunk starts with a section header followed by body text.
    Mixed,
}

impl ChunkKind {
    /// The stable string form used by store backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Header => "header",
            ChunkKind::Content => "content",
            ChunkKind::Mixed => "mixed",
        }
    }
}

impl FromStr for ChunkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "header" => Ok(ChunkKind::Header),
            "content" => Ok(ChunkKind::Content),
            "mixed" => Ok(ChunkKind::Mixed),
            other => Err(format!("unknown chunk kind '{other}'")),
        }
    }
}

/// A retrieval-sized segment of a document with its vector embedding.
///
/// Chunks are the unit of storage and search. A document that fits in a
/// single chunk is stored as one row with no `parent_document_id`; larger
/// documents become sibling rows sharing one generated parent id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The user that owns the source document.
    pub owner_id: String,
    /// The kind of document the chunk was cut from.
    pub doc_type: DocumentType,
    /// Original filename of the uploaded document.
    pub filename: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Shared id linking sibling chunks of a split document, `None` when
    /// the document fit in a single chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_document_id: Option<String>,
    /// Zero-based position of this chunk within its document.
    pub index: usize,
    /// Total number of chunks produced from the document.
    pub total: usize,
    /// The matched section header line, when structure-aware splitting
    /// found one for this region of the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Whether the chunk is a header, body content, or both.
    pub kind: ChunkKind,
    /// Character count of `text`.
    pub char_count: usize,
    /// Estimated token count of `text`.
    pub token_estimate: usize,
    /// Key-value metadata inherited from the upload plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// When the chunk was created.
    pub created_at: DateTime<Utc>,
}

/// The record returned by ingestion: identity fields of the stored
/// document plus the ids of every chunk persisted for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Identifier of the document, equal to its first chunk's id.
    pub id: String,
    /// The user that owns the document.
    pub owner_id: String,
    /// The kind of document.
    pub doc_type: DocumentType,
    /// Original filename of the upload.
    pub filename: String,
    /// Text of the first chunk.
    pub text: String,
    /// Key-value metadata recorded on every chunk of the document.
    pub metadata: HashMap<String, String>,
    /// When the document was ingested.
    pub created_at: DateTime<Utc>,
    /// Ids of every chunk persisted for this document, in document order.
    pub chunk_ids: Vec<String>,
}

/// An uploaded document waiting to be ingested, as handed to
/// [`ingest_batch`](crate::pipeline::RetrievalPipeline::ingest_batch).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSource {
    /// The kind of document.
    pub doc_type: DocumentType,
    /// Original filename of the upload.
    pub filename: String,
    /// Raw text content of the upload.
    pub content: String,
    /// Key-value metadata to record on every chunk.
    pub metadata: HashMap<String, String>,
}

/// A search candidate produced by a store backend, carrying the component
/// scores alongside their weighted combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The candidate chunk.
    pub chunk: Chunk,
    /// Vector similarity between the query and the chunk (higher is closer).
    pub vector_score: f32,
    /// Lexical relevance of the chunk for the query text.
    pub bm25_score: f32,
    /// The weighted sum of the two component scores.
    pub combined_score: f32,
}

/// A retrieved [`Chunk`] paired with relevance scores and highlights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The final relevance score (higher is more relevant). This is the
    /// combined hybrid score, or the reranker's score when reranking ran.
    pub score: f32,
    /// Vector similarity component of the score.
    pub vector_score: f32,
    /// Lexical relevance component of the score.
    pub bm25_score: f32,
    /// Up to three sentences of the chunk containing a query term.
    pub highlights: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_round_trips_through_str() {
        for doc_type in [
            DocumentType::Resume,
            DocumentType::Portfolio,
            DocumentType::Company,
            DocumentType::JobDescription,
        ] {
            let parsed: DocumentType = doc_type.as_str().parse().unwrap();
            assert_eq!(parsed, doc_type);
        }
        assert!("cover_letter".parse::<DocumentType>().is_err());
    }

    #[test]
    fn document_type_serializes_snake_case() {
        let json = serde_json::to_string(&DocumentType::JobDescription).unwrap();
        assert_eq!(json, "\"job_description\"");
    }
}
