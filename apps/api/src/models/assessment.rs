use serde::{Deserialize, Serialize};

/// One assessment from the corpus file. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub name: String,
    /// Relative (`/products/...`) or absolute, as curated in the corpus.
    pub url: String,
    pub remote_support: String,
    pub adaptive_support: String,
    pub test_type: String,
    /// Minutes. `None` when the catalogue lists a variable or unknown time.
    pub duration: Option<u32>,
    pub description: String,
}

impl AssessmentRecord {
    /// The text that gets embedded for this record. The index builder and the
    /// query side must agree on this shape.
    pub fn page_content(&self) -> String {
        format!(
            "Assessment: {}\nDescription: {}\nTest Type: {}\nRemote Testing: {}\nAdaptive Testing: {}\nDuration: {}",
            self.name,
            self.description,
            self.test_type,
            self.remote_support,
            self.adaptive_support,
            self.duration.map(|d| d.to_string()).unwrap_or_default(),
        )
    }

    /// Human-readable duration for prompts.
    pub fn duration_label(&self) -> String {
        match self.duration {
            Some(minutes) => minutes.to_string(),
            None => "Variable Time".to_string(),
        }
    }
}

/// A corpus record paired with its distance to the query embedding.
/// Lower distance means more relevant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub metadata: AssessmentRecord,
    pub distance: f32,
}

/// Returns `url` unchanged if it already carries a scheme, otherwise joins it
/// onto `origin` with exactly one slash between them.
pub fn resolve_url(origin: &str, url: &str) -> String {
    let url = url.trim();
    if has_scheme(url) {
        return url.to_string();
    }

    let origin = origin.trim_end_matches('/');
    let path = url.trim_start_matches('/');
    if path.is_empty() {
        format!("{origin}/")
    } else {
        format!("{origin}/{path}")
    }
}

fn has_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
