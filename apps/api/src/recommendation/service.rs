//! RecommendationService — orchestrates the full recommendation pipeline.
//!
//! Flow: validate query → VectorIndex::search → PromptBuilder::build →
//!       Generator::generate → TableParser::parse → items.
//!
//! Built once at startup by `init` and shared through `AppState`. Every stage
//! maps its failure to a distinct `RecommendError` kind.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::corpus::CorpusStore;
use crate::llm_client::{Generator, LlmClient, LlmError};
use crate::models::recommendation::RecommendationItem;
use crate::recommendation::prompts::PromptBuilder;
use crate::recommendation::table_parser::{ParseError, TableParser};
use crate::retrieval::embeddings::GeminiEmbeddings;
use crate::retrieval::index::{IndexError, VectorIndex};

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("{0}")]
    Validation(String),

    #[error("vector index unavailable: {0}")]
    IndexUnavailable(#[from] IndexError),

    #[error("generation failed: {0}")]
    GenerationFailed(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl RecommendError {
    /// Pipeline stage that produced the error, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            RecommendError::Validation(_) => "validation",
            RecommendError::IndexUnavailable(_) => "retrieval",
            RecommendError::GenerationFailed(_) => "generation",
            RecommendError::Parse(_) => "parsing",
        }
    }
}

pub struct RecommendationService {
    index: Arc<VectorIndex>,
    prompts: PromptBuilder,
    generator: Arc<dyn Generator>,
    parser: TableParser,
    top_k: usize,
}

impl RecommendationService {
    pub fn new(
        index: Arc<VectorIndex>,
        prompts: PromptBuilder,
        generator: Arc<dyn Generator>,
        parser: TableParser,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            prompts,
            generator,
            parser,
            top_k,
        }
    }

    /// Loads the corpus and index and wires the Gemini backends.
    /// Any failure here is fatal: the service must not start half-initialised.
    pub fn init(config: &Config) -> anyhow::Result<Self> {
        let corpus = Arc::new(
            CorpusStore::load(&config.corpus_path)
                .with_context(|| format!("Failed to load corpus from {}", config.corpus_path))?,
        );

        let timeout = Duration::from_secs(config.generation_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let embedder = Arc::new(GeminiEmbeddings::new(http, config.google_api_key.clone()));

        let index = VectorIndex::load(&config.index_dir, corpus.clone(), embedder)
            .with_context(|| format!("Failed to load vector index from {}", config.index_dir))?;

        let llm = LlmClient::new(config.google_api_key.clone(), timeout)
            .context("Failed to build LLM client")?;

        info!(
            "Recommendation service ready: {} assessments, {} vectors (model: {})",
            corpus.len(),
            index.len(),
            crate::llm_client::MODEL
        );

        Ok(Self::new(
            Arc::new(index),
            PromptBuilder::new(config.site_origin.clone()),
            Arc::new(llm),
            TableParser::new(config.site_origin.clone()),
            config.retrieval_top_k,
        ))
    }

    /// Runs the pipeline for one query. Returns 1..=10 items in model order.
    pub async fn recommend(&self, query: &str) -> Result<Vec<RecommendationItem>, RecommendError> {
        let result = self.run(query).await;
        if let Err(e) = &result {
            match e {
                RecommendError::Validation(_) => warn!("Rejected query: {e}"),
                _ => error!("Recommendation failed at {} for query {:?}: {e}", e.stage(), query),
            }
        }
        result
    }

    async fn run(&self, query: &str) -> Result<Vec<RecommendationItem>, RecommendError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RecommendError::Validation(
                "Query field is required".to_string(),
            ));
        }

        // Step 1: Retrieve
        let retrieved = self.index.search(query, self.top_k).await?;
        info!("Retrieved {} candidate assessments", retrieved.len());

        // Step 2: Prompt
        let prompt = self.prompts.build(query, &retrieved);

        // Step 3: Generate
        let raw = self.generator.generate(&prompt).await?;

        // Step 4: Parse
        let items = self.parser.parse(&raw)?;
        info!("Parsed {} recommendations", items.len());

        Ok(items)
    }
}
