// Recommendation pipeline: prompt construction, table parsing, orchestration
// and the HTTP handlers on top.
// All model calls go through llm_client; retrieval goes through retrieval::index.

pub mod handlers;
pub mod prompts;
pub mod service;
pub mod table_parser;
