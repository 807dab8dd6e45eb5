//! Command-line interface, parsed with `clap`.
//!
//! The corpus of record for this service is rebuilt wholesale: `reindex` is
//! the forced-refresh path, `ask` answers a customer question grounded in
//! retrieved context, `search` prints the raw context block without calling
//! the generation model, and `init` writes a starter configuration.

use clap::{Parser, Subcommand};

/// Parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Ask the store assistant a question, grounded in the indexed catalog.
    #[clap(name = "ask", alias = "a")]
    Ask {
        /// The customer's question. If not provided, a default is used.
        question: Option<String>,

        /// How many documents to retrieve as context.
        #[arg(name = "top-k", short = 'k')]
        top_k: Option<usize>,

        /// Discard the cache snapshot and rebuild the index before answering.
        #[arg(long)]
        refresh: bool,
    },

    /// Print the raw retrieval context for a query, without generation.
    #[clap(name = "search", alias = "s")]
    Search {
        /// The query to retrieve documents for.
        query: String,

        /// How many documents to retrieve.
        #[arg(name = "top-k", short = 'k')]
        top_k: Option<usize>,
    },

    /// Rebuild the index from the source collections and persist a fresh
    /// cache snapshot.
    Reindex,

    /// Write a starter config.yaml under the per-platform config directory.
    Init,
}
