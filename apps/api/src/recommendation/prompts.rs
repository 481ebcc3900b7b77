//! PromptBuilder — renders the recommendation prompt from a query and the
//! retrieved assessments.
//!
//! The column list below is shared with `table_parser`; changing one without
//! the other breaks parsing.

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, TABLE_ONLY_INSTRUCTION};
use crate::models::assessment::{resolve_url, RetrievedDocument};

/// Upper bound on rows requested from (and accepted from) the model.
pub const MAX_RECOMMENDATIONS: usize = 10;

/// Table columns, in the order the parser reads them.
pub const TABLE_COLUMNS: [&str; 6] = [
    "Assessment Name",
    "Remote Testing Support",
    "Adaptive/IRT Support",
    "Test Type (with meaning)",
    "Test Duration",
    "URL",
];

/// Replace: {query}, {retrieved_docs}, {max_rows}, {header}, {separator},
///          {grounding_instruction}, {table_only_instruction}
const RECOMMENDATION_PROMPT_TEMPLATE: &str = r#"Given the following query: "{query}"
And the retrieved assessments:
{retrieved_docs}

Recommend up to {max_rows} relevant assessments in a properly formatted markdown table with the following columns:
- Assessment Name
- Remote Testing Support (Yes/No)
- Adaptive/IRT Support (Yes/No)
- Test Type (with meaning)
- Test Duration (in minutes)
- URL (use actual URLs from the metadata)

Use this exact table format:
{header}
{separator}
| [Name 1] | Yes | No | [Type 1] | 30 | [URL 1] |
| [Name 2] | No | Yes | [Type 2] | 45 | [URL 2] |

{grounding_instruction}
Ensure all recommendations meet any duration or other requirements mentioned in the query.
{table_only_instruction}"#;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    site_origin: String,
}

impl PromptBuilder {
    pub fn new(site_origin: impl Into<String>) -> Self {
        Self {
            site_origin: site_origin.into(),
        }
    }

    pub fn build(&self, query: &str, retrieved: &[RetrievedDocument]) -> String {
        RECOMMENDATION_PROMPT_TEMPLATE
            .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
            .replace("{table_only_instruction}", TABLE_ONLY_INSTRUCTION)
            .replace("{max_rows}", &MAX_RECOMMENDATIONS.to_string())
            .replace("{header}", &table_header())
            .replace("{separator}", &table_separator())
            .replace("{retrieved_docs}", &self.summarize(retrieved))
            // Last, so text inside the query is never treated as a placeholder.
            .replace("{query}", query.trim())
    }

    /// One line per retrieved assessment.
    fn summarize(&self, retrieved: &[RetrievedDocument]) -> String {
        if retrieved.is_empty() {
            return "(no assessments retrieved)".to_string();
        }

        retrieved
            .iter()
            .map(|doc| {
                let m = &doc.metadata;
                format!(
                    "{} - Remote: {}, Adaptive: {}, Type: {}, Duration: {}, URL: {}",
                    m.name,
                    m.remote_support,
                    m.adaptive_support,
                    m.test_type,
                    m.duration_label(),
                    resolve_url(&self.site_origin, &m.url)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn table_header() -> String {
    format!("| {} |", TABLE_COLUMNS.join(" | "))
}

fn table_separator() -> String {
    let dashes: Vec<String> = TABLE_COLUMNS
        .iter()
        .map(|c| "-".repeat(c.len()))
        .collect();
    format!("|-{}-|", dashes.join("-|-"))
}
