//! Error taxonomy for the RAG pipeline.
//!
//! Every fallible step in the pipeline maps onto one of these variants so
//! callers can tell a recoverable degradation (missing source file, stale
//! cache) from a fatal one (embedding model unavailable). The orchestrator is
//! the single place where recoverable variants are downgraded to log lines;
//! only [`RagError::Generation`] is ever surfaced to the end user.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// A source collection file is missing or unreadable. The category
    /// contributes no documents; the build carries on.
    #[error("source collection unavailable at {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// One or both cache artifacts are absent. Triggers a full rebuild.
    #[error("cache snapshot absent: {0}")]
    CacheMiss(String),

    /// A cache artifact exists but fails to deserialize, or was written by a
    /// different embedding model. Treated exactly like a cache miss.
    #[error("cache snapshot corrupt: {0}")]
    CacheCorrupt(String),

    /// The embedding model could not be obtained at startup. Fatal to RAG
    /// readiness, but not to process liveness.
    #[error("embedding model unavailable: {0}")]
    EmbeddingModelUnavailable(String),

    /// Tokenization or model inference failed while encoding text.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Index construction failed during a build.
    #[error("index build failed: {0}")]
    IndexBuild(String),

    /// Query-time embedding or search failed. Degrades to empty context.
    #[error("retrieval failed: {0}")]
    RetrievalTransient(String),

    /// The generation call failed. Surfaced to the caller, never retried.
    #[error("generation request failed: {0}")]
    Generation(#[from] async_openai::error::OpenAIError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
