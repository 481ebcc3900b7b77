use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub corpus_path: String,
    pub index_dir: String,
    /// Prepended to relative assessment URLs.
    pub site_origin: String,
    pub retrieval_top_k: usize,
    pub generation_timeout_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            google_api_key: require_env("GOOGLE_API_KEY")?,
            corpus_path: env_or("CORPUS_PATH", "data/shl_individual_assessments.csv"),
            index_dir: env_or("INDEX_DIR", "data/vector_index"),
            site_origin: env_or("SITE_ORIGIN", "https://www.shl.com"),
            retrieval_top_k: env_or("RETRIEVAL_TOP_K", "10")
                .parse::<usize>()
                .context("RETRIEVAL_TOP_K must be a non-negative integer")?,
            generation_timeout_secs: env_or("GENERATION_TIMEOUT_SECS", "60")
                .parse::<u64>()
                .context("GENERATION_TIMEOUT_SECS must be a whole number of seconds")?,
            port: env_or("PORT", "5000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
