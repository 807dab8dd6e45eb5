//! # Embedding provider
//!
//! Maps batches of text onto fixed-dimension dense vectors. The core only
//! depends on the narrow [`Embedder`] trait; the production implementation
//! is [`SentenceEmbedder`], a multilingual MiniLM sentence-transformer run
//! with Candle (pure Rust ML framework).
//!
//! The model identifier is recorded alongside every cache snapshot, and a
//! snapshot built by a different model is rejected on load: build-time and
//! query-time embeddings must come from the same model or similarity scores
//! are meaningless.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use tokenizers::Tokenizer;

use crate::error::RagError;

/// Narrow interface between the RAG core and the embedding capability.
///
/// Implementations must be safe for concurrent read-only use: after startup
/// the same embedder serves every retrieval request without locking.
pub trait Embedder: Send + Sync {
    /// Encode a batch of texts. The output is index-aligned with the input
    /// and every vector has length [`Embedder::dimension`].
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Dimensionality of the vectors this model produces.
    fn dimension(&self) -> usize;

    /// Stable identifier of the model, stored in cache snapshots.
    fn model_id(&self) -> &str;
}

/// Sentence-embedding model loaded from the Hugging Face Hub.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
    model_id: String,
}

impl SentenceEmbedder {
    /// Download (or reuse from the local hub cache) and load the model.
    ///
    /// # Errors
    /// Returns [`RagError::EmbeddingModelUnavailable`] if any model artifact
    /// cannot be fetched or parsed. This is fatal to RAG readiness.
    pub fn load(model_id: &str) -> Result<Self, RagError> {
        let unavailable = |err: &dyn std::fmt::Display| {
            RagError::EmbeddingModelUnavailable(err.to_string())
        };

        let device = Device::Cpu;
        let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, "main".to_string());
        let api = Api::new().map_err(|e| unavailable(&e))?;
        let api_repo = api.repo(repo);

        let config_filename = api_repo.get("config.json").map_err(|e| unavailable(&e))?;
        let tokenizer_filename = api_repo.get("tokenizer.json").map_err(|e| unavailable(&e))?;
        let weights_filename = api_repo
            .get("model.safetensors")
            .map_err(|e| unavailable(&e))?;

        let config = std::fs::read_to_string(config_filename).map_err(|e| unavailable(&e))?;
        let config: Config = serde_json::from_str(&config).map_err(|e| unavailable(&e))?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename).map_err(|e| unavailable(&e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)
                .map_err(|e| unavailable(&e))?
        };
        let dimension = config.hidden_size;
        let model = BertModel::load(vb, &config).map_err(|e| unavailable(&e))?;

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
            model_id: model_id.to_string(),
        })
    }

    /// Encode one text: tokenize (truncating past the model's token limit),
    /// run the model, mean-pool over the attention mask, L2-normalize.
    fn encode_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let failed = |err: &dyn std::fmt::Display| RagError::Embedding(err.to_string());

        let tokens = self.tokenizer.encode(text, true).map_err(|e| failed(&e))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| failed(&e))?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| failed(&e))?;

        let output = self
            .model
            .forward(&token_ids, &token_type_ids, None)
            .map_err(|e| failed(&e))?;

        let pooled = self
            .mean_pool(&output, tokens.get_attention_mask())
            .map_err(|e| failed(&e))?;
        pooled.to_vec1::<f32>().map_err(|e| failed(&e))
    }

    /// Mean pooling over token embeddings, weighted by the attention mask,
    /// followed by L2 normalization.
    fn mean_pool(
        &self,
        embeddings: &Tensor,
        attention_mask: &[u32],
    ) -> Result<Tensor, candle_core::Error> {
        // embeddings: [1, seq_len, hidden]; mask broadcast as [1, seq_len, 1]
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let summed = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;
        let mean = summed.broadcast_div(&counts)?.squeeze(0)?;

        let norm = mean.sqr()?.sum_all()?.sqrt()?;
        mean.broadcast_div(&norm)
    }
}

impl Embedder for SentenceEmbedder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        texts.iter().map(|text| self.encode_one(text)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
