#![allow(dead_code)]
//! Parsing of the model's markdown transcription into an [`ExtractionResult`].
//!
//! The transcription has three regions: a bold-label summary block, a
//! bold-label standard block verification, and a pipe table of hardness
//! readings. Each region is located independently; a missing region just
//! leaves its part of the result empty. Malformed table rows and
//! non-numeric readings are dropped and counted, never raised.

use crate::observation::{ExtractionResult, ParseStats, SampleRecord};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const SUMMARY_HEADING: &str = "1. Test Summary Information";
pub const STANDARD_HEADING: &str = "2. Verification with Standard Block";
/// First cell of the hardness table header row.
pub const TABLE_HEADER_CELL: &str = "Sr. No.";

/// Serial, sample id, heat no, base, haz, weld, remarks.
pub const MIN_ROW_CELLS: usize = 7;

/// `**Label:** value` or `**Label**: value`, anything allowed before the bold marker.
static KEY_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*(?P<label>[^*]+?)\s*(?::\s*\*\*|\*\*\s*:)(?P<value>.*)$")
        .expect("key-value regex")
});

/// The three regions of a transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Summary,
    StandardBlock,
    Table,
}

impl Section {
    pub const ALL: [Section; 3] = [Self::Summary, Self::StandardBlock, Self::Table];
}

// ============================================================================
// Section extraction
// ============================================================================

/// Return the text of `section`, or `None` when its anchor is absent.
///
/// Summary and standard block run from the line after their heading up to
/// the next horizontal rule. If the rule is missing the section runs to the
/// end of the document. The table runs from its `| Sr. No.` header row to the
/// end of the document.
pub fn extract_section(text: &str, section: Section) -> Option<&str> {
    match section {
        Section::Summary => heading_section(text, SUMMARY_HEADING),
        Section::StandardBlock => heading_section(text, STANDARD_HEADING),
        Section::Table => table_section(text),
    }
}

fn heading_section<'a>(text: &'a str, heading: &str) -> Option<&'a str> {
    let mut offset = 0;
    let mut start = None;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        match start {
            None => {
                if line.contains(heading) {
                    start = Some(offset);
                }
            }
            Some(begin) => {
                if is_horizontal_rule(line) {
                    return Some(&text[begin..line_start]);
                }
            }
        }
    }

    start.map(|begin| &text[begin..])
}

fn table_section(text: &str) -> Option<&str> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if is_table_header(line) {
            return Some(&text[offset..]);
        }
        offset += line.len();
    }
    None
}

/// `---`, `***` or `___` (three or more, spaces allowed between).
fn is_horizontal_rule(line: &str) -> bool {
    let compact: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|marker| compact.iter().all(|c| c == marker))
}

fn is_table_header(line: &str) -> bool {
    let trimmed = line.trim();
    let Some(inner) = trimmed.strip_prefix('|') else {
        return false;
    };
    let first_cell = inner.split('|').next().unwrap_or("").trim();
    first_cell.starts_with(TABLE_HEADER_CELL)
}

/// Pipe rows made only of `-`, `:`, `|` and spaces.
fn is_separator_row(line: &str) -> bool {
    let inner = line.trim().trim_matches('|');
    inner.contains('-')
        && inner
            .chars()
            .all(|c| c == '-' || c == '|' || c == ':' || c.is_whitespace())
}

// ============================================================================
// Line parsers
// ============================================================================

/// Extract `(label, value)` from a bold-label line, both trimmed.
pub fn parse_key_value_line(line: &str) -> Option<(String, String)> {
    let caps = KEY_VALUE_RE.captures(line)?;
    let label = caps.name("label")?.as_str().trim();
    if label.is_empty() {
        return None;
    }
    let value = caps.name("value").map(|m| m.as_str().trim()).unwrap_or("");
    Some((label.to_string(), value.to_string()))
}

/// Split a table row into trimmed cells, dropping the outer pipes.
pub fn split_row_cells(line: &str) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .collect()
}

/// Parse a comma-separated group of readings. Tokens that are not made
/// purely of decimal digits are dropped.
pub fn parse_measurements(cell: &str) -> Vec<u64> {
    split_measurements(cell).0
}

/// Readings plus the number of non-empty tokens that were rejected.
fn split_measurements(cell: &str) -> (Vec<u64>, usize) {
    let mut values = Vec::new();
    let mut rejected = 0;

    for token in cell.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        let parsed = token
            .chars()
            .all(|c| c.is_ascii_digit())
            .then(|| token.parse::<u64>().ok())
            .flatten();
        match parsed {
            Some(v) => values.push(v),
            None => rejected += 1,
        }
    }

    (values, rejected)
}

/// Parse one data row of the hardness table.
///
/// Returns `None` for separator rows and rows with fewer than
/// [`MIN_ROW_CELLS`] cells. The serial cell (index 0) is not kept.
pub fn parse_table_row(line: &str) -> Option<SampleRecord> {
    parse_row(line).map(|(record, _)| record)
}

fn parse_row(line: &str) -> Option<(SampleRecord, usize)> {
    if is_separator_row(line) {
        return None;
    }

    let cells = split_row_cells(line);
    if cells.len() < MIN_ROW_CELLS {
        return None;
    }

    let (base, base_rejected) = split_measurements(&cells[3]);
    let (haz, haz_rejected) = split_measurements(&cells[4]);
    let (weld, weld_rejected) = split_measurements(&cells[5]);

    let record = SampleRecord {
        sample_id: cells[1].clone(),
        heat_no: cells[2].clone(),
        base,
        haz,
        weld,
        remarks: cells[6].clone(),
    };

    Some((record, base_rejected + haz_rejected + weld_rejected))
}

// ============================================================================
// Record builder
// ============================================================================

/// Parse a full transcription. Same input always gives the same result.
pub fn parse_markdown(text: &str) -> ExtractionResult {
    parse_markdown_with_stats(text).0
}

/// Parse a full transcription, also reporting what was dropped on the way.
pub fn parse_markdown_with_stats(text: &str) -> (ExtractionResult, ParseStats) {
    let mut stats = ParseStats::default();
    let mut result = ExtractionResult::default();

    for section in Section::ALL {
        let Some(body) = extract_section(text, section) else {
            debug!("Section {:?} not found in transcription", section);
            continue;
        };
        stats.sections_found += 1;

        match section {
            Section::Summary => result.summary = collect_key_values(body),
            Section::StandardBlock => result.standard = collect_key_values(body),
            Section::Table => result.samples = collect_samples(body, &mut stats),
        }
    }

    if stats.rows_dropped > 0 || stats.tokens_dropped > 0 {
        warn!(
            "Dropped {} malformed row(s) and {} non-numeric reading(s)",
            stats.rows_dropped, stats.tokens_dropped
        );
    }

    debug!(
        "Parsed transcription: {} summary fields, {} standard fields, {} samples",
        result.summary.len(),
        result.standard.len(),
        result.samples.len()
    );

    (result, stats)
}

/// Fold bold-label lines into a map. Later duplicates win.
fn collect_key_values(body: &str) -> BTreeMap<String, String> {
    body.lines().filter_map(parse_key_value_line).collect()
}

fn collect_samples(body: &str, stats: &mut ParseStats) -> Vec<SampleRecord> {
    let mut samples = Vec::new();

    let rows = body
        .lines()
        .filter(|l| l.trim_start().starts_with('|'))
        .filter(|l| !is_separator_row(l))
        .skip(1); // header

    for line in rows {
        stats.rows_seen += 1;
        match parse_row(line) {
            Some((record, rejected)) => {
                stats.tokens_dropped += rejected;
                samples.push(record);
            }
            None => {
                stats.rows_dropped += 1;
                debug!("Dropping malformed table row: {}", line.trim());
            }
        }
    }

    samples
}
