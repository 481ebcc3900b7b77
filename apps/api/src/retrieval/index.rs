//! VectorIndex — nearest-neighbour search over the embedded corpus.
//!
//! The persisted artifact is `<index_dir>/index.json`: a versioned manifest
//! plus one vector per corpus row. Search is an exhaustive squared-L2 scan,
//! which is exact and fast enough for a catalogue of a few hundred items.
//! The index is never mutated after load and is shared across requests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::corpus::CorpusStore;
use crate::models::assessment::RetrievedDocument;
use crate::retrieval::embeddings::{EmbeddingError, Embeddings};

pub const INDEX_FILE_NAME: &str = "index.json";
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index file not found at {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported index format version {found} (expected {})", INDEX_FORMAT_VERSION)]
    VersionMismatch { found: u32 },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index refers to corpus row {row}, but the corpus has {corpus_len} rows")]
    UnknownRow { row: usize, corpus_len: usize },

    #[error("index is corrupt: {0}")]
    Corrupt(String),

    #[error("embedding backend failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub row: usize,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
    pub entries: Vec<IndexEntry>,
}

pub struct VectorIndex {
    corpus: Arc<CorpusStore>,
    embedder: Arc<dyn Embeddings>,
    embedding_model: String,
    built_at: DateTime<Utc>,
    dimension: usize,
    /// (corpus row, vector), in insertion order. Ties in distance keep this order.
    entries: Vec<(usize, Array1<f32>)>,
}

impl VectorIndex {
    /// Loads `<dir>/index.json` and validates it against the corpus.
    pub fn load(
        dir: impl AsRef<Path>,
        corpus: Arc<CorpusStore>,
        embedder: Arc<dyn Embeddings>,
    ) -> Result<Self, IndexError> {
        let path = index_path(dir.as_ref());
        if !path.exists() {
            return Err(IndexError::NotFound(path.display().to_string()));
        }

        let data = std::fs::read_to_string(&path)?;
        let manifest: IndexManifest = serde_json::from_str(&data)?;
        let index = Self::from_manifest(manifest, corpus, embedder)?;

        info!(
            "Loaded vector index from {} ({} vectors, dim {}, model {}, built {})",
            path.display(),
            index.len(),
            index.dimension,
            index.embedding_model,
            index.built_at
        );
        Ok(index)
    }

    pub fn from_manifest(
        manifest: IndexManifest,
        corpus: Arc<CorpusStore>,
        embedder: Arc<dyn Embeddings>,
    ) -> Result<Self, IndexError> {
        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexError::VersionMismatch {
                found: manifest.format_version,
            });
        }
        if manifest.dimension == 0 {
            return Err(IndexError::Corrupt("dimension is zero".to_string()));
        }

        let mut entries = Vec::with_capacity(manifest.entries.len());
        for entry in manifest.entries {
            if entry.vector.len() != manifest.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: manifest.dimension,
                    actual: entry.vector.len(),
                });
            }
            if entry.vector.iter().any(|v| !v.is_finite()) {
                return Err(IndexError::Corrupt(format!(
                    "non-finite component in vector for row {}",
                    entry.row
                )));
            }
            if corpus.get(entry.row).is_none() {
                return Err(IndexError::UnknownRow {
                    row: entry.row,
                    corpus_len: corpus.len(),
                });
            }
            entries.push((entry.row, Array1::from(entry.vector)));
        }

        Ok(Self {
            corpus,
            embedder,
            embedding_model: manifest.embedding_model,
            built_at: manifest.built_at,
            dimension: manifest.dimension,
            entries,
        })
    }

    /// Embeds every corpus record and builds an in-memory index over them.
    pub async fn build(
        corpus: Arc<CorpusStore>,
        embedder: Arc<dyn Embeddings>,
    ) -> Result<Self, IndexError> {
        let texts: Vec<String> = corpus.records().iter().map(|r| r.page_content()).collect();
        let vectors = embedder.embed_documents(&texts).await?;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            }
            .into());
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: embedder.model().to_string(),
            dimension,
            built_at: Utc::now(),
            entries: vectors
                .into_iter()
                .enumerate()
                .map(|(row, vector)| IndexEntry { row, vector })
                .collect(),
        };

        Self::from_manifest(manifest, corpus, embedder)
    }

    /// Writes the index to `<dir>/index.json`, creating `dir` if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, IndexError> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = index_path(dir.as_ref());

        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension,
            built_at: self.built_at,
            entries: self
                .entries
                .iter()
                .map(|(row, vector)| IndexEntry {
                    row: *row,
                    vector: vector.to_vec(),
                })
                .collect(),
        };

        std::fs::write(&path, serde_json::to_string(&manifest)?)?;
        info!("Saved vector index to {}", path.display());
        Ok(path)
    }

    /// Returns up to `k` documents ordered by ascending distance to `query`.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>, IndexError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query).await?;
        if query_vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        let neighbours = self.nearest(&Array1::from(query_vector), k);
        debug!("Retrieved {} documents for '{}' (k={})", neighbours.len(), query, k);

        neighbours
            .into_iter()
            .map(|(row, distance)| {
                let metadata = self.corpus.get(row).cloned().ok_or(IndexError::UnknownRow {
                    row,
                    corpus_len: self.corpus.len(),
                })?;
                Ok::<_, IndexError>(RetrievedDocument { metadata, distance })
            })
            .collect()
    }

    fn nearest(&self, query: &Array1<f32>, k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .map(|(row, vector)| (*row, squared_l2(query, vector)))
            .collect();

        // sort_by is stable: equal distances keep insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        scored
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn index_path(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE_NAME)
}

fn squared_l2(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let diff = a - b;
    diff.dot(&diff)
}
