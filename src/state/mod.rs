use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cards::CardCorpus;
use crate::core::config::{AdvisorSettings, AppPaths, ConfigService};
use crate::llm::OpenAiProvider;
use crate::pipeline::RecommendationPipeline;
use crate::rag::{EmbeddingsStore, LinearRetriever};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigService,
    pub settings: Arc<AdvisorSettings>,
    pub corpus: Arc<CardCorpus>,
    pub pipeline: Arc<RecommendationPipeline>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Loads configuration, the card corpus and the embeddings store, and wires
    /// the recommendation pipeline to the configured provider.
    ///
    /// A missing API key does not fail startup; requests fail until one is set.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(InitializationError::Config)?;

        if settings.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set; chat requests will fail until it is configured");
        }

        let cards_path = paths.resolve_data_path(&settings.cards_path);
        let corpus = Arc::new(CardCorpus::load(&cards_path).map_err(InitializationError::Corpus)?);

        let embeddings_path = paths.resolve_data_path(&settings.embeddings_path);
        let store = EmbeddingsStore::load(&embeddings_path, &corpus)
            .map_err(InitializationError::Embeddings)?;
        tracing::info!(
            "Embeddings store ready: {} entries, {} dimensions, generated {}",
            store.len(),
            store.dimensions().unwrap_or(0),
            store.generated_at()
        );

        let provider =
            Arc::new(OpenAiProvider::from_settings(&settings).map_err(InitializationError::Provider)?);
        let pipeline = RecommendationPipeline::new(
            &settings,
            Arc::new(store),
            provider.clone(),
            provider,
            Arc::new(LinearRetriever),
        );

        Ok(Arc::new(Self::new(config, settings, corpus, pipeline)))
    }

    pub fn new(
        config: ConfigService,
        settings: AdvisorSettings,
        corpus: Arc<CardCorpus>,
        pipeline: RecommendationPipeline,
    ) -> Self {
        AppState {
            config,
            settings: Arc::new(settings),
            corpus,
            pipeline: Arc::new(pipeline),
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_data(dir: &std::path::Path) {
        fs::create_dir_all(dir.join("data")).expect("data dir");
        fs::write(
            dir.join("data/cards.json"),
            r#"[{"id":"a","name":"A","apply_url":"http://a","annual_fee":0},
                {"id":"b","name":"B","apply_url":"http://b","annual_fee":95}]"#,
        )
        .expect("cards");
        fs::write(
            dir.join("data/embeddings.json"),
            r#"{"generated_at":"2026-01-01T00:00:00Z","entries":[
                {"card_id":"a","embedding":[1.0,0.0]},
                {"card_id":"b","embedding":[0.0,1.0]}]}"#,
        )
        .expect("embeddings");
    }

    #[tokio::test]
    async fn initializes_from_data_files() {
        let root = tempdir().expect("root");
        let data = tempdir().expect("data");
        write_data(root.path());
        let paths = Arc::new(AppPaths::with_dirs(
            root.path().to_path_buf(),
            data.path().to_path_buf(),
        ));

        let state = AppState::initialize(paths).await.expect("state");
        assert_eq!(state.corpus.len(), 2);
        assert_eq!(state.pipeline.store().dimensions(), Some(2));
        assert_eq!(state.pipeline.store().len(), 2);
    }

    #[tokio::test]
    async fn missing_corpus_is_an_initialization_error() {
        let root = tempdir().expect("root");
        let data = tempdir().expect("data");
        let paths = Arc::new(AppPaths::with_dirs(
            root.path().to_path_buf(),
            data.path().to_path_buf(),
        ));

        let err = AppState::initialize(paths).await.err().expect("error");
        assert!(matches!(err, InitializationError::Corpus(_)));
    }
}
