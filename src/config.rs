//! Application configuration: a YAML file under the per-platform config
//! directory, written once by `freshrag init` and loaded on every run.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::debug;

use crate::error::RagError;

/// Multilingual sentence-transformer the store was tuned against; 384-d.
pub const DEFAULT_EMBEDDING_MODEL: &str =
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_top_k() -> usize {
    4
}

/// Everything the binary needs to run: the generation endpoint, the
/// embedding model, and where source data and the cache snapshot live.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct FreshRagConfig {
    /// API key for the OpenAI-compatible generation endpoint.
    pub api_key: String,

    /// Base URL of the generation endpoint.
    pub api_base: String,

    /// Generation model name.
    pub model: String,

    /// Embedding model identifier on the Hugging Face Hub. Changing it
    /// invalidates the cache snapshot on the next startup.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Directory holding the JSON source collections.
    pub data_dir: String,

    /// Directory holding the two snapshot artifacts.
    pub cache_dir: String,

    /// How many documents to retrieve as grounding context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl FreshRagConfig {
    /// The configuration written by `freshrag init`.
    pub fn default_under(config_dir: &Path) -> Self {
        Self {
            api_key: "CHANGEME".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.5-flash".to_string(),
            embedding_model: default_embedding_model(),
            data_dir: "./data".to_string(),
            cache_dir: config_dir.join("cache").to_string_lossy().into_owned(),
            top_k: default_top_k(),
        }
    }
}

/// Load the configuration from a YAML file.
///
/// # Errors
/// [`RagError::Config`] if the file cannot be read or parsed.
pub fn load_config(file: &str) -> Result<FreshRagConfig, RagError> {
    debug!("loading config from {file}");
    let content =
        fs::read_to_string(file).map_err(|err| RagError::Config(format!("{file}: {err}")))?;
    serde_yaml::from_str(&content).map_err(|err| RagError::Config(format!("{file}: {err}")))
}
