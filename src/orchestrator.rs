//! # Startup orchestration
//!
//! Owns the load-or-build lifecycle: obtain the embedding model, try the
//! cache snapshot, otherwise normalize every source collection, embed the
//! full document set in one batch, build the flat index, and persist a new
//! snapshot.
//!
//! The lifecycle runs once, synchronously, before any query is served. The
//! resulting [`RagState`] is an explicitly owned value (no process global)
//! and is read-only afterwards, so concurrent retrieval needs no locking.
//! Rebuilding means running [`bootstrap`] again with `force_refresh = true`.

use std::path::Path;
use tracing::{error, info, warn};

use crate::config::FreshRagConfig;
use crate::documents::{self, Document};
use crate::embedder::{Embedder, SentenceEmbedder};
use crate::error::RagError;
use crate::index_store::{self, FlatIndex};

/// Everything a query needs once startup has succeeded: the embedding
/// provider used at build time, the flat index, and the document sequence
/// aligned with it (`documents.len() == index.len()` always).
pub struct ReadyRag {
    pub embedder: Box<dyn Embedder>,
    pub index: FlatIndex,
    pub documents: Vec<Document>,
}

/// Lifecycle state of the RAG subsystem.
///
/// `FailedModelLoad` and `FailedBuild` are absorbing: the process stays up
/// and the retriever answers with its startup sentinel until a restart (or
/// forced refresh) succeeds.
pub enum RagState {
    Uninitialized,
    FailedModelLoad,
    FailedBuild,
    Ready(ReadyRag),
}

impl RagState {
    pub fn is_ready(&self) -> bool {
        matches!(self, RagState::Ready(_))
    }

    /// Number of indexed documents, zero unless ready.
    pub fn document_count(&self) -> usize {
        match self {
            RagState::Ready(rag) => rag.documents.len(),
            _ => 0,
        }
    }
}

/// Full startup routine: load the embedding model, then load-or-build.
///
/// Never panics and never returns an error: every failure is logged and
/// folded into the returned state so the process keeps serving (degraded)
/// responses.
pub fn bootstrap(config: &FreshRagConfig, force_refresh: bool) -> RagState {
    info!(model = %config.embedding_model, "loading embedding model");
    let embedder: Box<dyn Embedder> = match SentenceEmbedder::load(&config.embedding_model) {
        Ok(embedder) => Box::new(embedder),
        Err(err) => {
            error!(%err, "embedding model unavailable; retrieval stays degraded");
            return RagState::FailedModelLoad;
        }
    };
    build_state(embedder, config, force_refresh)
}

/// Load-or-build with an already-obtained embedding provider.
///
/// Separated from [`bootstrap`] so the cache and build paths can be
/// exercised with an injected embedder.
pub fn build_state(
    embedder: Box<dyn Embedder>,
    config: &FreshRagConfig,
    force_refresh: bool,
) -> RagState {
    let cache_dir = Path::new(&config.cache_dir);

    if !force_refresh {
        match index_store::load(cache_dir, embedder.model_id()) {
            Ok((index, documents)) => {
                info!(documents = documents.len(), "restored snapshot from cache");
                return RagState::Ready(ReadyRag {
                    embedder,
                    index,
                    documents,
                });
            }
            Err(RagError::CacheMiss(reason)) => {
                info!(%reason, "no cache snapshot; building from source");
            }
            Err(err) => warn!(%err, "cache snapshot rejected; building from source"),
        }
    }

    let documents = documents::load_documents(Path::new(&config.data_dir));
    match build_index(embedder.as_ref(), &documents) {
        Ok(index) => {
            if let Err(err) = index_store::persist(&index, &documents, embedder.model_id(), cache_dir) {
                warn!(%err, "failed to persist snapshot; continuing without cache");
            }
            info!(documents = documents.len(), "index built and ready");
            RagState::Ready(ReadyRag {
                embedder,
                index,
                documents,
            })
        }
        Err(err) => {
            error!(%err, "index build failed");
            RagState::FailedBuild
        }
    }
}

fn build_index(embedder: &dyn Embedder, documents: &[Document]) -> Result<FlatIndex, RagError> {
    let texts: Vec<String> = documents.iter().map(|doc| doc.text.clone()).collect();
    let vectors = embedder.encode(&texts)?;
    if vectors.len() != documents.len() {
        return Err(RagError::IndexBuild(format!(
            "embedder returned {} vectors for {} documents",
            vectors.len(),
            documents.len()
        )));
    }
    FlatIndex::build(vectors, embedder.dimension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::testing::{FailingEmbedder, KeywordEmbedder};
    use crate::retriever::retrieve_context;
    use tempfile::TempDir;

    fn config_for(data: &TempDir, cache: &TempDir) -> FreshRagConfig {
        FreshRagConfig {
            api_key: "unused".to_string(),
            api_base: "http://localhost:1".to_string(),
            model: "unused".to_string(),
            embedding_model: "test/keyword-embedder".to_string(),
            data_dir: data.path().to_string_lossy().into_owned(),
            cache_dir: cache.path().to_string_lossy().into_owned(),
            top_k: 3,
        }
    }

    fn write_sources(data: &TempDir) {
        std::fs::write(
            data.path().join("database.products.json"),
            r#"[
                {"name": "Táo Fuji", "price": 50000, "originalPrice": 60000, "unit": "kg"},
                {"name": "Rau muống", "price": 12000, "unit": "bó"},
                {"name": "Cá hồi", "price": 250000, "unit": "kg"}
            ]"#,
        )
        .unwrap();
        std::fs::write(
            data.path().join("database.coupons.json"),
            r#"[{"code": "FRESH10", "type": "PERCENT", "value": 10,
                 "description": "giảm giá toàn bộ đơn hàng", "isActive": true}]"#,
        )
        .unwrap();
    }

    #[test]
    fn build_produces_ready_state_with_aligned_index() {
        let (data, cache) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        write_sources(&data);

        let state = build_state(Box::new(KeywordEmbedder::new()), &config_for(&data, &cache), false);
        let RagState::Ready(rag) = &state else {
            panic!("expected ready state");
        };
        assert_eq!(rag.documents.len(), 4);
        assert_eq!(rag.index.len(), rag.documents.len());
    }

    #[test]
    fn second_startup_hits_the_cache() {
        let (data, cache) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        write_sources(&data);
        let config = config_for(&data, &cache);

        let first = build_state(Box::new(KeywordEmbedder::new()), &config, false);
        assert_eq!(first.document_count(), 4);

        // Remove the sources: only a cache hit can still yield 4 documents.
        std::fs::remove_file(data.path().join("database.products.json")).unwrap();
        std::fs::remove_file(data.path().join("database.coupons.json")).unwrap();

        let second = build_state(Box::new(KeywordEmbedder::new()), &config, false);
        assert_eq!(second.document_count(), 4);
    }

    #[test]
    fn forced_refresh_rebuilds_from_source() {
        let (data, cache) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        write_sources(&data);
        let config = config_for(&data, &cache);

        build_state(Box::new(KeywordEmbedder::new()), &config, false);

        // Drop the sources; a forced refresh must reflect that (placeholder only).
        std::fs::remove_file(data.path().join("database.products.json")).unwrap();
        std::fs::remove_file(data.path().join("database.coupons.json")).unwrap();

        let refreshed = build_state(Box::new(KeywordEmbedder::new()), &config, true);
        assert_eq!(refreshed.document_count(), 1);
    }

    #[test]
    fn rebuild_is_idempotent_for_search_results() {
        let (data, cache) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        write_sources(&data);
        let config = config_for(&data, &cache);

        let first = build_state(Box::new(KeywordEmbedder::new()), &config, true);
        let second = build_state(Box::new(KeywordEmbedder::new()), &config, true);

        let a = retrieve_context(&first, "táo", 2);
        let b = retrieve_context(&second, "táo", 2);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn empty_sources_still_build_a_single_placeholder() {
        let (data, cache) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let state = build_state(Box::new(KeywordEmbedder::new()), &config_for(&data, &cache), false);
        assert_eq!(state.document_count(), 1);
    }

    #[test]
    fn embedding_failure_during_build_is_absorbed() {
        let (data, cache) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        write_sources(&data);

        let state = build_state(Box::new(FailingEmbedder), &config_for(&data, &cache), false);
        assert!(matches!(state, RagState::FailedBuild));
        assert_eq!(state.document_count(), 0);
    }

    #[test]
    fn mismatched_snapshot_model_triggers_rebuild() {
        let (data, cache) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        write_sources(&data);
        let config = config_for(&data, &cache);

        build_state(Box::new(KeywordEmbedder::new()), &config, false);

        // A different embedder must not accept the keyword embedder's snapshot.
        let state = build_state(Box::new(FailingEmbedder), &config, false);
        assert!(matches!(state, RagState::FailedBuild));
    }
}
