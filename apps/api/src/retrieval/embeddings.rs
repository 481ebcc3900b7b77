//! Embedding backends.
//!
//! `Embeddings` is the seam between the vector index and whatever turns text
//! into vectors. Production uses the Gemini embedding endpoint; tests plug in
//! deterministic doubles.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::llm_client::GOOGLE_API_BASE;

/// Embedding model the persisted index was built with.
pub const EMBEDDING_MODEL: &str = "models/embedding-001";
/// Upper bound on documents per `batchEmbedContents` request.
const MAX_BATCH: usize = 100;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding backend returned an empty vector")]
    Empty,
}

#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Model identifier, recorded in the index manifest.
    fn model(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

impl<'a> EmbedRequest<'a> {
    fn new(model: &'a str, text: &'a str) -> Self {
        Self {
            model,
            content: Content {
                parts: vec![Part { text }],
            },
        }
    }
}

/// Gemini `embedContent` / `batchEmbedContents` client.
#[derive(Clone)]
pub struct GeminiEmbeddings {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiEmbeddings {
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            model: EMBEDDING_MODEL.to_string(),
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, EmbeddingError> {
        let url = format!("{GOOGLE_API_BASE}/{}:{method}", self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Embeddings for GeminiEmbeddings {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH) {
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedRequest::new(&self.model, text))
                    .collect(),
            };
            let response: BatchEmbedResponse = self.post("batchEmbedContents", &request).await?;

            if response.embeddings.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: response.embeddings.len(),
                });
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
            debug!("Embedded {}/{} documents", vectors.len(), texts.len());
        }

        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbedRequest::new(&self.model, text);
        let response: EmbedResponse = self.post("embedContent", &request).await?;

        if response.embedding.values.is_empty() {
            return Err(EmbeddingError::Empty);
        }
        Ok(response.embedding.values)
    }
}
