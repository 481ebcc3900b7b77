//! Test doubles for the embedding and generation seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::corpus::CorpusStore;
use crate::llm_client::{Generator, LlmError};
use crate::models::assessment::AssessmentRecord;
use crate::recommendation::prompts::PromptBuilder;
use crate::recommendation::service::RecommendationService;
use crate::recommendation::table_parser::TableParser;
use crate::retrieval::embeddings::{EmbeddingError, Embeddings};
use crate::retrieval::index::VectorIndex;

pub const TEST_ORIGIN: &str = "https://www.shl.com";

pub fn record(name: &str, duration: Option<u32>) -> AssessmentRecord {
    let slug = name.to_lowercase().replace(' ', "-");
    AssessmentRecord {
        name: name.to_string(),
        url: format!("/view/{slug}/"),
        remote_support: "Yes".to_string(),
        adaptive_support: "No".to_string(),
        test_type: "K".to_string(),
        duration,
        description: String::new(),
    }
}

/// Returns the same query vector every time and counts calls.
pub struct FixedEmbeddings {
    query: Vec<f32>,
    query_calls: AtomicUsize,
}

impl FixedEmbeddings {
    pub fn new(query: Vec<f32>) -> Self {
        Self {
            query,
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embeddings for FixedEmbeddings {
    fn model(&self) -> &str {
        "fixed-test"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| self.query.clone()).collect())
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.query.clone())
    }
}

/// Bag-of-keywords embedder: one dimension per vocabulary stem, L2-normalised.
/// Good enough to make topical queries land on topical documents.
pub struct KeywordEmbeddings {
    vocabulary: Vec<&'static str>,
    query_calls: AtomicUsize,
}

impl Default for KeywordEmbeddings {
    fn default() -> Self {
        Self {
            vocabulary: vec![
                "java", "program", "develop", "collaborat", "clerical", "data", "entry", "sales",
                "personality",
            ],
            query_calls: AtomicUsize::new(0),
        }
    }
}

impl KeywordEmbeddings {
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|stem| text.matches(stem).count() as f32)
            .collect();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embeddings for KeywordEmbeddings {
    fn model(&self) -> &str {
        "keyword-test"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.embed(text))
    }
}

/// Embedder whose query path always fails, as if the backend were unreachable.
pub struct UnreachableEmbeddings {
    dimension: usize,
}

impl UnreachableEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embeddings for UnreachableEmbeddings {
    fn model(&self) -> &str {
        "unreachable-test"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| vec![1.0; self.dimension]).collect())
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Api {
            status: 503,
            message: "backend unavailable".to_string(),
        })
    }
}

/// Returns a canned response (or failure) and records the prompts it saw.
pub struct ScriptedGenerator {
    response: Result<String, u16>,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with an API error of the given status.
    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(LlmError::Api {
                status: *status,
                message: "scripted failure".to_string(),
            }),
        }
    }
}

/// The two-assessment corpus used by the end-to-end tests.
pub fn java_and_clerical_corpus() -> Arc<CorpusStore> {
    Arc::new(CorpusStore::new(vec![
        AssessmentRecord {
            description: "Java programming knowledge for software developers".to_string(),
            ..record("Java Programming Test", Some(35))
        },
        AssessmentRecord {
            description: "Clerical data entry speed and accuracy".to_string(),
            test_type: "A".to_string(),
            ..record("Unrelated Clerical Test", Some(60))
        },
    ]))
}

/// Service over `java_and_clerical_corpus`, wired to the given doubles.
pub async fn service_with(
    embedder: Arc<KeywordEmbeddings>,
    generator: Arc<ScriptedGenerator>,
) -> RecommendationService {
    let index = VectorIndex::build(java_and_clerical_corpus(), embedder)
        .await
        .unwrap();
    RecommendationService::new(
        Arc::new(index),
        PromptBuilder::new(TEST_ORIGIN),
        generator,
        TableParser::new(TEST_ORIGIN),
        10,
    )
}
