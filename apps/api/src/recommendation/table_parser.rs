//! TableParser — turns the model's markdown table into validated
//! `RecommendationItem`s.
//!
//! The model's output is untrusted text. Table-level problems (no table, wrong
//! header) fail the whole parse; row-level problems skip that row only. No
//! input makes this module panic.
//!
//! Field policies:
//! - duration: trailing unit words are dropped; a range yields its lower bound.
//! - test type: comma-separated list of non-empty tokens.
//! - url: markdown links are unwrapped; relative paths get the site origin,
//!   schemeless urls on the site's own host get its scheme, other bare hosts
//!   are rejected.
//! - description: "<name> - <test type cell>".

use reqwest::Url;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::assessment::resolve_url;
use crate::models::recommendation::RecommendationItem;
use crate::recommendation::prompts::{MAX_RECOMMENDATIONS, TABLE_COLUMNS};

const COLUMN_COUNT: usize = TABLE_COLUMNS.len();
const MIN_TABLE_LINES: usize = 3;
const DURATION_UNITS: &[&str] = &["minutes", "minute", "mins", "min", "m"];
const RANGE_SEPARATORS: &[char] = &['-', '–', '—'];

/// Table-level failures. Any of these rejects the whole response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no valid table found in the response")]
    NoTableFound,

    #[error("invalid table header: expected {} columns, got {found}", COLUMN_COUNT)]
    InvalidHeader { found: usize },

    #[error("no valid recommendations found ({skipped} rows skipped)")]
    NoValidRecommendations { skipped: usize },
}

/// Row-level failures. The row is skipped and parsing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("expected {} cells, got {found}", COLUMN_COUNT)]
    WrongCellCount { found: usize },

    #[error("duration '{0}' is not a whole number of minutes")]
    InvalidDuration(String),

    #[error("test type cell has no usable tokens")]
    EmptyTestType,

    #[error("url '{0}' is not an absolute http(s) url")]
    InvalidUrl(String),
}

/// One table line split into its cells, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTableRow {
    pub cells: Vec<String>,
}

impl RawTableRow {
    fn from_line(line: &str) -> Self {
        Self {
            cells: split_cells(line),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableParser {
    site_origin: String,
}

impl TableParser {
    pub fn new(site_origin: impl Into<String>) -> Self {
        Self {
            site_origin: site_origin.into(),
        }
    }

    /// Parses a full model response. Returns 1..=10 items in table order.
    pub fn parse(&self, raw: &str) -> Result<Vec<RecommendationItem>, ParseError> {
        let text = strip_code_fences(raw);
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if lines.len() < MIN_TABLE_LINES || !lines.iter().any(|l| l.contains('|')) {
            return Err(ParseError::NoTableFound);
        }

        let header = RawTableRow::from_line(lines[0]);
        if header.cells.len() != COLUMN_COUNT {
            return Err(ParseError::InvalidHeader {
                found: header.cells.len(),
            });
        }

        // lines[1] is the separator row; skipped regardless of its content.
        let mut items = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in lines.iter().enumerate().skip(2) {
            if !line.contains('|') {
                debug!("Ignoring non-table line {}: {}", line_no, line);
                continue;
            }

            match self.parse_row(&RawTableRow::from_line(line)) {
                Ok(item) => items.push(item),
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping malformed row {}: {} ({})", line_no, line, e);
                }
            }
        }

        if items.is_empty() {
            return Err(ParseError::NoValidRecommendations { skipped });
        }

        if items.len() > MAX_RECOMMENDATIONS {
            warn!(
                "Model returned {} rows, keeping the first {}",
                items.len(),
                MAX_RECOMMENDATIONS
            );
            items.truncate(MAX_RECOMMENDATIONS);
        }

        Ok(items)
    }

    /// Validates one row and extracts its typed fields.
    pub fn parse_row(&self, row: &RawTableRow) -> Result<RecommendationItem, RowError> {
        let [name, remote, adaptive, test_type, duration, url] = row.cells.as_slice() else {
            return Err(RowError::WrongCellCount {
                found: row.cells.len(),
            });
        };

        Ok(RecommendationItem {
            url: self.parse_url(url)?,
            adaptive_support: adaptive.clone(),
            description: format!("{name} - {test_type}"),
            duration: parse_duration(duration)?,
            remote_support: remote.clone(),
            test_type: parse_test_types(test_type)?,
        })
    }

    fn parse_url(&self, cell: &str) -> Result<String, RowError> {
        let invalid = || RowError::InvalidUrl(cell.to_string());
        let target = unwrap_markdown_link(cell);

        // Already absolute: keep it verbatim, but only for web schemes.
        if let Ok(url) = Url::parse(target) {
            return if is_web_url(&url) {
                Ok(target.to_string())
            } else {
                Err(invalid())
            };
        }

        let origin = Url::parse(&self.site_origin).map_err(|_| invalid())?;
        let resolved = if let Some(rest) = target.strip_prefix("//") {
            // Scheme-relative: the host is already present.
            format!("{}://{rest}", origin.scheme())
        } else if target.starts_with('/') {
            resolve_url(&self.site_origin, target)
        } else {
            let first_segment = target.split(['/', '?', '#']).next().unwrap_or_default();
            match origin.host_str() {
                Some(host) if first_segment.eq_ignore_ascii_case(host) => {
                    format!("{}://{target}", origin.scheme())
                }
                // A bare foreign host cannot be resolved against our origin.
                _ if first_segment.contains('.') => return Err(invalid()),
                _ => resolve_url(&self.site_origin, target),
            }
        };

        match Url::parse(&resolved) {
            Ok(url) if is_web_url(&url) => Ok(resolved),
            _ => Err(invalid()),
        }
    }
}

fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host().is_some()
}

/// Splits a table line on `|`, drops the empty fields produced by outer
/// pipes, trims, and discards empty cells.
fn split_cells(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

/// `"30"`, `"30 minutes"`, `"30-45 minutes"` (→ 30), `"20 – 25 mins"` (→ 20).
fn parse_duration(cell: &str) -> Result<u32, RowError> {
    let invalid = || RowError::InvalidDuration(cell.to_string());

    let value = cell.trim().to_ascii_lowercase();
    match value.split_once(RANGE_SEPARATORS) {
        Some((low, high)) => {
            // Both sides must be numbers; "-5" or "30-" is not a range.
            parse_minutes(high).ok_or_else(invalid)?;
            parse_minutes(low).ok_or_else(invalid)
        }
        None => parse_minutes(&value).ok_or_else(invalid),
    }
}

/// One side of a duration cell, with an optional trailing unit word.
fn parse_minutes(part: &str) -> Option<u32> {
    let mut value = part.trim();
    for unit in DURATION_UNITS {
        if let Some(stripped) = value.strip_suffix(unit) {
            value = stripped.trim_end();
            break;
        }
    }
    value.parse::<u32>().ok()
}

fn parse_test_types(cell: &str) -> Result<Vec<String>, RowError> {
    let types: Vec<String> = cell
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if types.is_empty() {
        return Err(RowError::EmptyTestType);
    }
    Ok(types)
}

/// `[label](https://x/y)` → `https://x/y`; `<https://x/y>` → `https://x/y`;
/// anything else is returned trimmed.
fn unwrap_markdown_link(cell: &str) -> &str {
    let cell = cell.trim();
    if let Some(rest) = cell.strip_prefix('[') {
        if let Some((_, target)) = rest.split_once("](") {
            if let Some(target) = target.strip_suffix(')') {
                return target.trim();
            }
        }
    }
    cell.strip_prefix('<')
        .and_then(|c| c.strip_suffix('>'))
        .unwrap_or(cell)
}

/// Strips a ```markdown ... ``` (or bare ```) fence around the table.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("markdown", "md", ...) on the opening line.
    let body = stripped.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://www.shl.com";
    const HEADER: &str = "| Assessment Name | Remote Testing Support | Adaptive/IRT Support | Test Type (with meaning) | Test Duration | URL |";
    const SEPARATOR: &str = "|---|---|---|---|---|---|";

    fn parser() -> TableParser {
        TableParser::new(ORIGIN)
    }

    fn table(rows: &[&str]) -> String {
        let mut lines = vec![HEADER, SEPARATOR];
        lines.extend_from_slice(rows);
        lines.join("\n")
    }

    #[test]
    fn test_well_formed_table_yields_one_item_per_row_in_order() {
        let raw = table(&[
            "| Java 8 (New) | Yes | Yes | K (Knowledge & Skills) | 18 | /view/java-8-new/ |",
            "| Verify Numerical | Yes | Yes | A (Ability), P (Personality) | 24 minutes | https://www.shl.com/view/verify-numerical/ |",
            "| OPQ32r | Yes | No | P | 25 | /view/opq32r/ |",
        ]);

        let items = parser().parse(&raw).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].description, "Java 8 (New) - K (Knowledge & Skills)");
        assert_eq!(items[1].description, "Verify Numerical - A (Ability), P (Personality)");
        assert_eq!(items[2].description, "OPQ32r - P");

        assert_eq!(items[0].url, "https://www.shl.com/view/java-8-new/");
        assert_eq!(items[0].remote_support, "Yes");
        assert_eq!(items[0].adaptive_support, "Yes");
        assert_eq!(items[0].duration, 18);
        assert_eq!(items[0].test_type, vec!["K (Knowledge & Skills)"]);
        assert_eq!(
            items[1].test_type,
            vec!["A (Ability)", "P (Personality)"]
        );
        assert_eq!(items[2].adaptive_support, "No");
    }

    #[test]
    fn test_duration_with_unit_word() {
        assert_eq!(parse_duration("35 minutes").unwrap(), 35);
        assert_eq!(parse_duration("35 Minutes").unwrap(), 35);
        assert_eq!(parse_duration("1 minute").unwrap(), 1);
        assert_eq!(parse_duration("40 mins").unwrap(), 40);
        assert_eq!(parse_duration("40min").unwrap(), 40);
        assert_eq!(parse_duration("12").unwrap(), 12);
    }

    #[test]
    fn test_duration_range_takes_lower_bound() {
        assert_eq!(parse_duration("30-45 minutes").unwrap(), 30);
        assert_eq!(parse_duration("30 - 45").unwrap(), 30);
        assert_eq!(parse_duration("20 – 25 mins").unwrap(), 20);
        assert_eq!(parse_duration("45-30").unwrap(), 45);
    }

    #[test]
    fn test_duration_range_with_units_on_both_sides() {
        assert_eq!(parse_duration("30 mins - 45 mins").unwrap(), 30);
        assert_eq!(parse_duration("20 minutes – 25 minutes").unwrap(), 20);
        assert_eq!(parse_duration("10min-15min").unwrap(), 10);
        assert!(matches!(
            parse_duration("30 mins - many mins"),
            Err(RowError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_duration_range_is_consistent_across_rows() {
        let raw = table(&[
            "| A | Yes | No | K | 30-45 minutes | /a/ |",
            "| B | Yes | No | K | 10-15 minutes | /b/ |",
        ]);
        let items = parser().parse(&raw).unwrap();
        assert_eq!(items[0].duration, 30);
        assert_eq!(items[1].duration, 10);
    }

    #[test]
    fn test_non_numeric_durations_are_rejected() {
        for bad in ["Variable Time", "N/A", "-5", "30-", "-", "thirty", "3.5", "minutes", ""] {
            assert!(
                matches!(parse_duration(bad), Err(RowError::InvalidDuration(_))),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_relative_url_gets_origin_and_absolute_url_is_unchanged() {
        let p = parser();
        assert_eq!(p.parse_url("/assessment/x").unwrap(), "https://www.shl.com/assessment/x");
        assert_eq!(
            p.parse_url("https://www.shl.com/assessment/x").unwrap(),
            "https://www.shl.com/assessment/x"
        );
        assert_eq!(
            p.parse_url("http://example.com/a?b=c").unwrap(),
            "http://example.com/a?b=c"
        );
    }

    #[test]
    fn test_url_with_host_but_no_scheme_is_not_prefixed_twice() {
        let p = parser();
        assert_eq!(
            p.parse_url("www.shl.com/view/x/").unwrap(),
            "https://www.shl.com/view/x/"
        );
        assert_eq!(
            p.parse_url("//www.shl.com/view/x/").unwrap(),
            "https://www.shl.com/view/x/"
        );
        assert_eq!(p.parse_url("view/x/").unwrap(), "https://www.shl.com/view/x/");
        assert!(matches!(
            p.parse_url("example.com/view/x/"),
            Err(RowError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_markdown_link_urls_are_unwrapped() {
        let p = parser();
        assert_eq!(
            p.parse_url("[Link](/view/java-8-new/)").unwrap(),
            "https://www.shl.com/view/java-8-new/"
        );
        assert_eq!(
            p.parse_url("[Java](https://www.shl.com/view/java/)").unwrap(),
            "https://www.shl.com/view/java/"
        );
        assert_eq!(
            p.parse_url("<https://www.shl.com/view/java/>").unwrap(),
            "https://www.shl.com/view/java/"
        );
    }

    #[test]
    fn test_url_that_cannot_be_made_absolute_is_rejected() {
        let p = parser();
        assert!(matches!(p.parse_url("ftp://x/y"), Err(RowError::InvalidUrl(_))));
        assert!(matches!(p.parse_url("https://"), Err(RowError::InvalidUrl(_))));
        let broken_origin = TableParser::new("not an origin");
        assert!(matches!(
            broken_origin.parse_url("/view/x/"),
            Err(RowError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_one_malformed_row_is_skipped() {
        let raw = table(&[
            "| A | Yes | No | K | 30 | /a/ |",
            "| B | Yes | No | K | /b/ |",
            "| C | Yes | No | K | 20 | /c/ |",
            "| D | Yes | No | K | 10 | /d/ |",
        ]);
        let items = parser().parse(&raw).unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(names, vec!["A - K", "C - K", "D - K"]);
    }

    #[test]
    fn test_row_with_bad_field_is_skipped_but_batch_continues() {
        let raw = table(&[
            "| A | Yes | No | K | Variable | /a/ |",
            "| B | Yes | No | , | 20 | /b/ |",
            "| C | Yes | No | K | 20 | ftp://c/ |",
            "| D | Yes | No | K | 10 | /d/ |",
        ]);
        let items = parser().parse(&raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "D - K");
    }

    #[test]
    fn test_empty_cells_shift_count_and_skip_row() {
        // An empty cell is discarded, so the row ends up one short.
        let raw = table(&["| A | | No | K | 30 | /a/ |", "| B | Yes | No | K | 30 | /b/ |"]);
        let items = parser().parse(&raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "B - K");
    }

    #[test]
    fn test_zero_surviving_rows_is_an_error_not_empty_success() {
        let raw = table(&["| A | Yes | No | K | soon | /a/ |", "| B | Yes |"]);
        assert_eq!(
            parser().parse(&raw),
            Err(ParseError::NoValidRecommendations { skipped: 2 })
        );
    }

    #[test]
    fn test_header_and_separator_only_has_no_table() {
        let raw = format!("{HEADER}\n{SEPARATOR}");
        assert_eq!(parser().parse(&raw), Err(ParseError::NoTableFound));
    }

    #[test]
    fn test_text_without_pipes_has_no_table() {
        let raw = "I could not find any assessments.\nSorry.\nTry again.";
        assert_eq!(parser().parse(raw), Err(ParseError::NoTableFound));
        assert_eq!(parser().parse(""), Err(ParseError::NoTableFound));
        assert_eq!(parser().parse("\n   \n\t\n"), Err(ParseError::NoTableFound));
    }

    #[test]
    fn test_wrong_header_width_is_invalid_header() {
        let raw = "| Name | URL |\n|---|---|\n| A | /a/ |";
        assert_eq!(
            parser().parse(raw),
            Err(ParseError::InvalidHeader { found: 2 })
        );
    }

    #[test]
    fn test_prose_before_table_makes_header_invalid() {
        let raw = format!("Here are my picks:\n{}", table(&["| A | Yes | No | K | 30 | /a/ |"]));
        assert_eq!(
            parser().parse(&raw),
            Err(ParseError::InvalidHeader { found: 1 })
        );
    }

    #[test]
    fn test_blank_lines_and_trailing_prose_are_ignored() {
        let raw = format!(
            "\n\n{HEADER}\n\n{SEPARATOR}\n| A | Yes | No | K | 30 | /a/ |\n\nThese fit the brief.\n"
        );
        let items = parser().parse(&raw).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_fenced_table_is_parsed() {
        let raw = format!(
            "```markdown\n{}\n```",
            table(&["| A | Yes | No | K | 30 | /a/ |"])
        );
        let items = parser().parse(&raw).unwrap();
        assert_eq!(items[0].url, "https://www.shl.com/a/");
    }

    #[test]
    fn test_rows_without_outer_pipes() {
        let raw = "Assessment Name | Remote | Adaptive | Type | Duration | URL\n\
                   --- | --- | --- | --- | --- | ---\n\
                   A | Yes | No | K | 30 | /a/";
        let items = parser().parse(raw).unwrap();
        assert_eq!(items[0].description, "A - K");
        assert_eq!(items[0].duration, 30);
    }

    #[test]
    fn test_separator_line_is_skipped_unconditionally() {
        // Second line is a data row, but it sits where the separator belongs.
        let raw = table(&[]).replace(SEPARATOR, "| X | Yes | No | K | 30 | /x/ |")
            + "\n| A | Yes | No | K | 30 | /a/ |";
        let items = parser().parse(&raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "A - K");
    }

    #[test]
    fn test_results_are_capped_at_ten() {
        let rows: Vec<String> = (0..12)
            .map(|i| format!("| T{i} | Yes | No | K | {i} | /t{i}/ |"))
            .collect();
        let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let items = parser().parse(&table(&row_refs)).unwrap();
        assert_eq!(items.len(), MAX_RECOMMENDATIONS);
        assert_eq!(items[9].duration, 9);
    }

    #[test]
    fn test_hostile_input_does_not_panic() {
        let inputs = [
            "|",
            "||||||\n||||||\n||||||",
            "| a | b | c | d | e | f |\n|\n| ü | ñ | 漢 | 字 | 99999999999 | [x](",
            "```",
            "```\n```",
            "| [ | ]( | ) | < | > | - |\n-\n| a | b | c | d | 1 | [](/) |",
        ];
        for input in inputs {
            let _ = parser().parse(input);
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```md\n| a |\n```"), "| a |");
        assert_eq!(strip_code_fences("```\n| a |\n```"), "| a |");
        assert_eq!(strip_code_fences("| a |"), "| a |");
        assert_eq!(strip_code_fences("```\n| a |"), "| a |");
    }

    #[test]
    fn test_parse_row_wrong_cell_count() {
        let row = RawTableRow {
            cells: vec!["A".to_string(); 7],
        };
        assert_eq!(
            parser().parse_row(&row),
            Err(RowError::WrongCellCount { found: 7 })
        );
    }
}
