//! Builds `embeddings.json` from the card corpus.
//!
//! Usage: `generate-embeddings [OUTPUT_PATH] [BATCH_SIZE]`

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use card_advisor::cards::CardCorpus;
use card_advisor::core::config::{AppPaths, ConfigService};
use card_advisor::core::logging;
use card_advisor::llm::OpenAiProvider;
use card_advisor::rag::indexer::{build_store, DEFAULT_BATCH_SIZE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths, "generate-embeddings.log");

    let config = ConfigService::new(paths.clone());
    let settings = config.load_settings().context("Failed to load settings")?;
    settings.require_api_key()?;

    let mut args = env::args().skip(1);
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.project_root.join(&settings.embeddings_path));
    let batch_size = match args.next() {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("Invalid batch size '{}'", raw))?,
        None => DEFAULT_BATCH_SIZE,
    };

    let cards_path = paths.resolve_data_path(&settings.cards_path);
    let corpus = CardCorpus::load(&cards_path)
        .with_context(|| format!("Failed to load cards from {}", cards_path.display()))?;

    let provider = OpenAiProvider::from_settings(&settings)?;
    let store = build_store(&corpus, &provider, &settings.embedding_model, batch_size).await?;

    store
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(
        "Wrote {} embeddings ({} dimensions) to {}",
        store.len(),
        store.dimensions().unwrap_or(0),
        output.display()
    );

    Ok(())
}
