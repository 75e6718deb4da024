//! The per-request flow: embed → retrieve → format → generate → assemble.
//!
//! Steps run one after another. Everything the pipeline holds is read-only after
//! construction, so one instance is shared by all requests.

use std::sync::Arc;
use std::time::Instant;

use crate::core::config::{AdvisorSettings, ApiKey};
use crate::core::errors::AdvisorError;
use crate::llm::{ChatProvider, EmbeddingProvider};
use crate::rag::{CandidateContext, EmbeddingsStore, QueryEmbedder, Retriever};
use crate::recommend::{RecommendationGenerator, RecommendationResponse};

pub struct RecommendationPipeline {
    api_key: Option<ApiKey>,
    store: Arc<EmbeddingsStore>,
    embedder: QueryEmbedder,
    retriever: Arc<dyn Retriever>,
    generator: RecommendationGenerator,
    top_k: usize,
}

impl RecommendationPipeline {
    pub fn new(
        settings: &AdvisorSettings,
        store: Arc<EmbeddingsStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        let embedder = QueryEmbedder::new(
            embeddings,
            settings.embedding_model.clone(),
            store.dimensions(),
        );
        let generator = RecommendationGenerator::new(
            chat,
            settings.chat_model.clone(),
            settings.temperature,
            settings.max_tokens,
        );

        Self {
            api_key: settings.api_key.clone(),
            store,
            embedder,
            retriever,
            generator,
            top_k: settings.top_k,
        }
    }

    pub fn store(&self) -> &EmbeddingsStore {
        &self.store
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn chat_model(&self) -> &str {
        self.generator.model_id()
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn retriever_name(&self) -> &str {
        self.retriever.name()
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn recommend(&self, message: &str) -> Result<RecommendationResponse, AdvisorError> {
        if self.api_key.is_none() {
            return Err(AdvisorError::MissingApiKey);
        }
        if message.trim().is_empty() {
            return Err(AdvisorError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }

        let started = Instant::now();
        let query_vector = self.embedder.embed_query(message).await?;

        let ranked = self.retriever.retrieve(&query_vector, &self.store, self.top_k);
        tracing::debug!(
            "Retrieved {} of {} cards (top score {:?})",
            ranked.len(),
            self.store.len(),
            ranked.first().map(|c| c.score)
        );
        let candidates = CandidateContext::build(ranked);

        let outcome = self.generator.generate(message, &candidates).await?;
        let response = RecommendationResponse::assemble(outcome);

        tracing::info!(
            "Recommended {} card(s) from {} candidates in {} ms",
            response.recommendations.len(),
            candidates.cards().len(),
            started.elapsed().as_millis()
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CreditCard;
    use crate::core::errors::ExternalService;
    use crate::llm::ChatRequest;
    use crate::rag::{CardEmbedding, LinearRetriever};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingEmbeddings {
        calls: AtomicUsize,
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbeddings {
        fn name(&self) -> &str {
            "counting"
        }

        async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, AdvisorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs.iter().map(|_| self.vector.clone()).collect())
        }
    }

    struct CountingChat {
        calls: AtomicUsize,
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatProvider for CountingChat {
        fn name(&self) -> &str {
            "counting"
        }

        async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, AdvisorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(user) = request.messages.last() {
                self.prompts.lock().expect("lock").push(user.content.clone());
            }
            Ok(self.reply.clone())
        }
    }

    struct FailingChat;

    #[async_trait]
    impl ChatProvider for FailingChat {
        fn name(&self) -> &str {
            "failing"
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, AdvisorError> {
            Err(AdvisorError::external_with_details(
                ExternalService::ChatCompletion,
                "authentication failed (status 401)",
                "Incorrect API key provided",
            ))
        }
    }

    fn abc_store() -> Arc<EmbeddingsStore> {
        let entries = [("A", [1.0, 0.0]), ("B", [0.0, 1.0]), ("C", [0.7, 0.7])]
            .into_iter()
            .map(|(name, vector)| {
                let card = CreditCard::new(name, name, format!("http://{}", name.to_lowercase()));
                CardEmbedding::new(Arc::new(card), vector.to_vec())
            })
            .collect();
        Arc::new(EmbeddingsStore::new(entries, Utc::now(), None).expect("store"))
    }

    fn settings(with_key: bool, top_k: usize) -> AdvisorSettings {
        AdvisorSettings {
            api_key: if with_key { ApiKey::new("sk-test") } else { None },
            top_k,
            ..AdvisorSettings::default()
        }
    }

    fn fakes(reply: &str) -> (Arc<CountingEmbeddings>, Arc<CountingChat>) {
        (
            Arc::new(CountingEmbeddings {
                calls: AtomicUsize::new(0),
                vector: vec![1.0, 0.0],
            }),
            Arc::new(CountingChat {
                calls: AtomicUsize::new(0),
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }),
        )
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_call() {
        let (embeddings, chat) = fakes("{}");
        let pipeline = RecommendationPipeline::new(
            &settings(false, 12),
            abc_store(),
            embeddings.clone(),
            chat.clone(),
            Arc::new(LinearRetriever),
        );

        let err = pipeline.recommend("best cash back card").await.unwrap_err();
        assert!(matches!(err, AdvisorError::MissingApiKey));
        assert_eq!(embeddings.calls.load(Ordering::SeqCst), 0);
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn top_candidates_reach_the_prompt_and_hallucinations_are_dropped() {
        let reply = r#"{"cards":[{"credit_card_name":"A","apply_url":"http://a","reason":"ok"},{"credit_card_name":"B","apply_url":"http://b","reason":"not retrieved"},{"credit_card_name":"Z","apply_url":"http://z","reason":"invented"}]}"#;
        let (embeddings, chat) = fakes(reply);
        let pipeline = RecommendationPipeline::new(
            &settings(true, 2),
            abc_store(),
            embeddings.clone(),
            chat.clone(),
            Arc::new(LinearRetriever),
        );

        let response = pipeline.recommend("travel").await.expect("response");

        let names: Vec<&str> = response
            .recommendations
            .iter()
            .map(|r| r.credit_card_name.as_str())
            .collect();
        assert_eq!(names, vec!["A"]);
        assert_eq!(response.raw_model_answer.as_deref(), Some(reply));
        assert_eq!(embeddings.calls.load(Ordering::SeqCst), 1);
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);

        let prompts = chat.prompts.lock().expect("lock");
        let candidate_block = prompts[0].split_once("\n\n").expect("question then candidates").1;
        let lines: Vec<&str> = candidate_block.lines().skip(1).collect();
        assert_eq!(lines, vec!["A | {} | http://a", "C | {} | http://c"]);
    }

    #[tokio::test]
    async fn malformed_model_output_is_not_an_error() {
        let (embeddings, chat) = fakes("I think card A is great.");
        let pipeline = RecommendationPipeline::new(
            &settings(true, 12),
            abc_store(),
            embeddings,
            chat,
            Arc::new(LinearRetriever),
        );

        let response = pipeline.recommend("anything").await.expect("response");
        assert!(response.recommendations.is_empty());
        assert_eq!(
            response.raw_model_answer.as_deref(),
            Some("I think card A is great.")
        );
    }

    #[tokio::test]
    async fn chat_failure_is_fatal_for_the_request() {
        let (embeddings, _) = fakes("{}");
        let pipeline = RecommendationPipeline::new(
            &settings(true, 12),
            abc_store(),
            embeddings,
            Arc::new(FailingChat),
            Arc::new(LinearRetriever),
        );

        let err = pipeline.recommend("anything").await.unwrap_err();
        assert_eq!(err.details(), Some("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_calls() {
        let (embeddings, chat) = fakes("{}");
        let pipeline = RecommendationPipeline::new(
            &settings(true, 12),
            abc_store(),
            embeddings.clone(),
            chat.clone(),
            Arc::new(LinearRetriever),
        );

        let err = pipeline.recommend("  \n").await.unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidRequest(_)));
        assert_eq!(embeddings.calls.load(Ordering::SeqCst), 0);
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }
}
