//! # Index store
//!
//! Builds, persists, and loads the nearest-neighbor index over the document
//! embeddings. The index is flat and exhaustive (`hora`'s brute-force index
//! under Euclidean distance): correctness and determinism matter more than
//! scale for a catalog of this size, so there is no quantization and no
//! graph approximation.
//!
//! ## Snapshot layout
//! Two paired artifacts under the cache directory:
//! - `flat_index.bin` — the vector matrix, bincode-serialized; the flat
//!   search structure is rebuilt from it on load (exhaustive search over
//!   the same vectors is bit-for-bit the same index).
//! - `documents.yaml` — the ordered document sequence plus the embedding
//!   model id.
//!
//! A snapshot is only valid if **both** artifacts exist, deserialize, align
//! with each other, and were written by the embedding model currently in
//! use. Anything else is a cache miss and triggers a rebuild; it is never
//! fatal.

use hora::core::ann_index::ANNIndex;
use hora::core::metrics::Metric;
use hora::index::bruteforce_idx::BruteForceIndex;
use hora::index::bruteforce_params::BruteForceParams;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::documents::Document;
use crate::error::RagError;

/// File name of the serialized index artifact.
pub const INDEX_FILE: &str = "flat_index.bin";

/// File name of the document-sequence artifact.
pub const DOCS_FILE: &str = "documents.yaml";

/// Exhaustive L2 nearest-neighbor index, immutable once built.
///
/// Vector *i* corresponds to document *i* in the parallel sequence; the
/// store holds no other link between them. The raw vectors are kept so the
/// index can be persisted losslessly.
pub struct FlatIndex {
    index: BruteForceIndex<f32, usize>,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct IndexArtifact {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotMeta {
    model_id: String,
    documents: Vec<Document>,
}

impl FlatIndex {
    /// Build a flat index over `vectors`, one entry per position.
    ///
    /// # Errors
    /// [`RagError::IndexBuild`] if any vector's dimension disagrees with
    /// `dimension` or the underlying index rejects an insert.
    pub fn build(vectors: Vec<Vec<f32>>, dimension: usize) -> Result<Self, RagError> {
        let mut index = BruteForceIndex::new(dimension, &BruteForceParams::default());
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(RagError::IndexBuild(format!(
                    "vector {position} has dimension {} (expected {dimension})",
                    vector.len()
                )));
            }
            index
                .add(vector, position)
                .map_err(|err| RagError::IndexBuild(err.to_string()))?;
        }
        index
            .build(Metric::Euclidean)
            .map_err(|err| RagError::IndexBuild(err.to_string()))?;

        Ok(Self {
            index,
            dimension,
            vectors,
        })
    }

    /// Positions of the `k` nearest vectors to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<usize>, RagError> {
        if query.len() != self.dimension {
            return Err(RagError::RetrievalTransient(format!(
                "query vector has dimension {} (index expects {})",
                query.len(),
                self.dimension
            )));
        }
        Ok(self.index.search(query, k))
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Persist the snapshot: index vectors plus document sequence.
///
/// The embedding model id is recorded so a later [`load`] can reject a
/// snapshot produced by a different model.
pub fn persist(
    index: &FlatIndex,
    documents: &[Document],
    model_id: &str,
    cache_dir: &Path,
) -> Result<(), RagError> {
    fs::create_dir_all(cache_dir)?;

    let artifact = IndexArtifact {
        dimension: index.dimension,
        vectors: index.vectors.clone(),
    };
    let bytes = bincode::serde::encode_to_vec(&artifact, bincode::config::standard())
        .map_err(|err| RagError::CacheCorrupt(err.to_string()))?;
    fs::write(cache_dir.join(INDEX_FILE), bytes)?;

    let meta = SnapshotMeta {
        model_id: model_id.to_string(),
        documents: documents.to_vec(),
    };
    let yaml =
        serde_yaml::to_string(&meta).map_err(|err| RagError::CacheCorrupt(err.to_string()))?;
    fs::write(cache_dir.join(DOCS_FILE), yaml)?;

    Ok(())
}

/// Load the snapshot from `cache_dir`.
///
/// # Errors
/// - [`RagError::CacheMiss`] if either artifact is absent.
/// - [`RagError::CacheCorrupt`] if either artifact fails to deserialize,
///   the two disagree on the entry count, or the snapshot was written by a
///   model other than `expected_model_id`.
///
/// All of these are recoverable; the caller falls through to a rebuild.
pub fn load(
    cache_dir: &Path,
    expected_model_id: &str,
) -> Result<(FlatIndex, Vec<Document>), RagError> {
    let index_path = cache_dir.join(INDEX_FILE);
    let docs_path = cache_dir.join(DOCS_FILE);
    if !index_path.exists() || !docs_path.exists() {
        return Err(RagError::CacheMiss(format!(
            "expected {} and {} under {}",
            INDEX_FILE,
            DOCS_FILE,
            cache_dir.display()
        )));
    }

    let yaml =
        fs::read_to_string(&docs_path).map_err(|err| RagError::CacheCorrupt(err.to_string()))?;
    let meta: SnapshotMeta =
        serde_yaml::from_str(&yaml).map_err(|err| RagError::CacheCorrupt(err.to_string()))?;

    if meta.model_id != expected_model_id {
        return Err(RagError::CacheCorrupt(format!(
            "snapshot was built with embedding model {} (expected {expected_model_id})",
            meta.model_id
        )));
    }

    let bytes = fs::read(&index_path).map_err(|err| RagError::CacheCorrupt(err.to_string()))?;
    let (artifact, _): (IndexArtifact, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|err| RagError::CacheCorrupt(err.to_string()))?;

    if artifact.vectors.len() != meta.documents.len() {
        return Err(RagError::CacheCorrupt(format!(
            "artifacts disagree: {} vectors vs {} documents",
            artifact.vectors.len(),
            meta.documents.len()
        )));
    }

    let index = FlatIndex::build(artifact.vectors, artifact.dimension)
        .map_err(|err| RagError::CacheCorrupt(err.to_string()))?;
    Ok((index, meta.documents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocCategory;
    use tempfile::TempDir;

    fn sample_vectors() -> Vec<Vec<f32>> {
        vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]]
    }

    fn sample_documents() -> Vec<Document> {
        ["gốc", "gần", "xa"]
            .iter()
            .map(|text| Document {
                category: DocCategory::Product,
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn search_returns_nearest_first() {
        let index = FlatIndex::build(sample_vectors(), 2).unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.search(&[0.9, 0.0], 2).unwrap();
        assert_eq!(hits[0], 1);
        assert_eq!(hits[1], 0);
    }

    #[test]
    fn build_rejects_mismatched_dimension() {
        let vectors = vec![vec![0.0, 0.0], vec![1.0]];
        assert!(matches!(
            FlatIndex::build(vectors, 2),
            Err(RagError::IndexBuild(_))
        ));
    }

    #[test]
    fn search_rejects_mismatched_query_dimension() {
        let index = FlatIndex::build(sample_vectors(), 2).unwrap();
        assert!(matches!(
            index.search(&[1.0, 2.0, 3.0], 1),
            Err(RagError::RetrievalTransient(_))
        ));
    }

    #[test]
    fn snapshot_round_trip_preserves_documents_and_results() {
        let dir = TempDir::new().unwrap();
        let documents = sample_documents();
        let index = FlatIndex::build(sample_vectors(), 2).unwrap();

        let before = index.search(&[4.0, 4.0], 3).unwrap();
        persist(&index, &documents, "model-a", dir.path()).unwrap();

        let (restored, restored_docs) = load(dir.path(), "model-a").unwrap();
        assert_eq!(restored_docs, documents);
        assert_eq!(restored.len(), index.len());
        assert_eq!(restored.dimension(), 2);
        assert_eq!(restored.search(&[4.0, 4.0], 3).unwrap(), before);
    }

    #[test]
    fn absent_artifacts_are_a_cache_miss() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load(dir.path(), "model-a"),
            Err(RagError::CacheMiss(_))
        ));

        // Only one of the two artifacts present is still a miss.
        std::fs::write(dir.path().join(INDEX_FILE), b"whatever").unwrap();
        assert!(matches!(
            load(dir.path(), "model-a"),
            Err(RagError::CacheMiss(_))
        ));
    }

    #[test]
    fn corrupt_documents_artifact_is_cache_corrupt() {
        let dir = TempDir::new().unwrap();
        let index = FlatIndex::build(sample_vectors(), 2).unwrap();
        persist(&index, &sample_documents(), "model-a", dir.path()).unwrap();

        std::fs::write(dir.path().join(DOCS_FILE), ": not valid yaml [").unwrap();
        assert!(matches!(
            load(dir.path(), "model-a"),
            Err(RagError::CacheCorrupt(_))
        ));
    }

    #[test]
    fn corrupt_index_artifact_is_cache_corrupt() {
        let dir = TempDir::new().unwrap();
        let index = FlatIndex::build(sample_vectors(), 2).unwrap();
        persist(&index, &sample_documents(), "model-a", dir.path()).unwrap();

        std::fs::write(dir.path().join(INDEX_FILE), b"\xff\xfe garbage").unwrap();
        assert!(matches!(
            load(dir.path(), "model-a"),
            Err(RagError::CacheCorrupt(_))
        ));
    }

    #[test]
    fn model_mismatch_is_cache_corrupt() {
        let dir = TempDir::new().unwrap();
        let index = FlatIndex::build(sample_vectors(), 2).unwrap();
        persist(&index, &sample_documents(), "model-a", dir.path()).unwrap();

        assert!(matches!(
            load(dir.path(), "model-b"),
            Err(RagError::CacheCorrupt(_))
        ));
    }

    #[test]
    fn mismatched_artifact_counts_are_cache_corrupt() {
        let dir = TempDir::new().unwrap();
        let index = FlatIndex::build(sample_vectors(), 2).unwrap();
        // Persist one document fewer than there are vectors.
        persist(&index, &sample_documents()[..2], "model-a", dir.path()).unwrap();

        assert!(matches!(
            load(dir.path(), "model-a"),
            Err(RagError::CacheCorrupt(_))
        ));
    }
}
