use serde::{Deserialize, Serialize};

/// A validated recommendation row, as returned to API callers.
///
/// Field order mirrors the public JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    /// Always absolute (scheme and host present).
    pub url: String,
    pub adaptive_support: String,
    pub description: String,
    /// Minutes. The lower bound when the model quoted a range.
    pub duration: u32,
    pub remote_support: String,
    /// Never empty.
    pub test_type: Vec<String>,
}
