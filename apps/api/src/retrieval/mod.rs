// Retrieval: embedding backends and the persisted vector index.

pub mod embeddings;
pub mod index;
