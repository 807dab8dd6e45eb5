//! # FreshRAG (library root)
//!
//! Retrieval-augmented generation backend for the FreshFood clean-food
//! store's assistant. The pipeline turns the store's JSON catalog dumps
//! (products, categories, blog articles, coupons) into a searchable
//! semantic index and, per question, retrieves the closest documents to
//! ground the generated answer.
//!
//! ## Pipeline
//! raw records → [`documents`] (normalize to text) → [`embedder`] (dense
//! vectors) → [`index_store`] (flat L2 index + snapshot) → [`retriever`]
//! (top-k context) → [`api`] (generation call).
//!
//! [`orchestrator`] owns the load-or-build startup lifecycle and the
//! resulting read-only [`orchestrator::RagState`].
//!
//! ## Modules
//! - [`api`], [`commands`], [`config`], [`documents`], [`embedder`],
//!   [`error`], [`index_store`], [`orchestrator`], [`retriever`]

use directories::ProjectDirs;
use std::path::PathBuf;

pub mod api;
pub mod commands;
pub mod config;
pub mod documents;
pub mod embedder;
pub mod error;
pub mod index_store;
pub mod orchestrator;
pub mod retriever;

use crate::error::RagError;

/// Return the per-platform configuration directory used by FreshRAG.
///
/// Uses [`directories::ProjectDirs`] with the application triple
/// `("com", "freshfood", "freshrag")`, so you get the right place on each
/// OS (e.g. `~/.config/freshrag` under XDG). The directory is **not**
/// created by this function.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be
/// determined.
pub fn config_dir() -> Result<PathBuf, RagError> {
    let proj_dirs = ProjectDirs::from("com", "freshfood", "freshrag")
        .ok_or_else(|| RagError::Config("unable to determine config directory".to_string()))?;
    Ok(proj_dirs.config_dir().to_path_buf())
}
