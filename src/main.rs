//! FreshRAG CLI entry point.
//!
//! Handles command parsing, configuration loading, and dispatch:
//!
//! ```sh
//! freshrag init
//! freshrag reindex
//! freshrag ask "Táo giá bao nhiêu?"
//! freshrag search "bảo quản rau" -k 3
//! ```

use clap::Parser;
use once_cell::sync::OnceCell;
use std::{error::Error, fs};
use tracing::{debug, info};

use freshrag::{api, commands, config, config_dir, orchestrator, retriever};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = commands::Cli::parse();

    if let commands::Commands::Init = cli.command {
        return init();
    }

    let config_path = config_dir()?.join("config.yaml");
    debug!("loading config from: {}", config_path.display());
    let mut rag_config = config::load_config(&config_path.to_string_lossy())?;

    match cli.command {
        commands::Commands::Ask {
            question,
            top_k,
            refresh,
        } => {
            if let Some(k) = top_k {
                rag_config.top_k = k;
            }
            let question =
                question.unwrap_or_else(|| "Cửa hàng có những sản phẩm gì?".to_string());
            let state = orchestrator::bootstrap(&rag_config, refresh);
            let chat = api::answer(&rag_config, &state, &question).await?;
            println!("{}", chat.answer);
        }
        commands::Commands::Search { query, top_k } => {
            let state = orchestrator::bootstrap(&rag_config, false);
            let context = retriever::retrieve_context(&state, &query, top_k.unwrap_or(3));
            println!("{context}");
        }
        commands::Commands::Reindex => {
            let state = orchestrator::bootstrap(&rag_config, true);
            if state.is_ready() {
                println!("index rebuilt: {} documents", state.document_count());
            } else {
                return Err("reindex failed; see logs".into());
            }
        }
        commands::Commands::Init => unreachable!("handled above"),
    }

    Ok(())
}

/// Write a starter configuration under the per-platform config directory.
fn init() -> Result<(), Box<dyn Error>> {
    let config_dir = config_dir()?;
    fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.yaml");
    info!("creating config file: {}", config_path.display());
    let rag_config = config::FreshRagConfig::default_under(&config_dir);
    fs::write(&config_path, serde_yaml::to_string(&rag_config)?)?;

    println!("wrote {}", config_path.display());
    Ok(())
}
