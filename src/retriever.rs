//! # Retrieval
//!
//! Query-time path: embed the query with the same model used at build time,
//! search the flat index, map the returned positions back onto the document
//! sequence, and join the texts into one context block for the generation
//! step.
//!
//! Retrieval never aborts its caller: an unready state answers with a fixed
//! startup sentinel, and any transient failure degrades to an empty context.

use tracing::warn;

use crate::error::RagError;
use crate::orchestrator::{RagState, ReadyRag};

/// Returned whenever the index or the embedding model is not available yet.
pub const STARTUP_SENTINEL: &str = "Hệ thống đang khởi động...";

/// Retrieve the `k` documents nearest to `query`, newline-joined.
pub fn retrieve_context(state: &RagState, query: &str, k: usize) -> String {
    let RagState::Ready(rag) = state else {
        return STARTUP_SENTINEL.to_string();
    };

    match try_retrieve(rag, query, k) {
        Ok(context) => context,
        Err(err) => {
            warn!(%err, "retrieval failed; degrading to empty context");
            String::new()
        }
    }
}

fn try_retrieve(rag: &ReadyRag, query: &str, k: usize) -> Result<String, RagError> {
    let vectors = rag.embedder.encode(&[query.to_string()])?;
    let query_vector = vectors.into_iter().next().ok_or_else(|| {
        RagError::RetrievalTransient("embedder returned no vector for the query".to_string())
    })?;

    let positions = rag.index.search(&query_vector, k)?;

    // Positions past the document sequence would mean index/document desync;
    // drop them instead of panicking.
    let texts: Vec<&str> = positions
        .iter()
        .filter(|&&position| position < rag.documents.len())
        .map(|&position| rag.documents[position].text.as_str())
        .collect();

    Ok(texts.join("\n"))
}
