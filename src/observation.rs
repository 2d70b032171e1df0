//! Record types for one transcribed Vickers hardness observation sheet.
//!
//! Built once per uploaded image by `markdown_parser`, consumed by
//! `sheet_writer`, then dropped. Nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bold-label fields from "1. Test Summary Information", label → value.
/// Unknown labels are kept; the writer only looks up the ones it maps.
pub type SummaryRecord = BTreeMap<String, String>;

/// Bold-label fields from "2. Verification with Standard Block".
pub type StandardBlockRecord = BTreeMap<String, String>;

/// One of the three hardness measurement groups of a sample row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementGroup {
    /// Points 1–6.
    Base,
    /// Points 7–24.
    Haz,
    /// Points 25–33.
    Weld,
}

impl MeasurementGroup {
    pub const ALL: [MeasurementGroup; 3] = [Self::Base, Self::Haz, Self::Weld];

    /// Number of readings the printed sheet has room for.
    pub fn nominal_len(self) -> usize {
        match self {
            Self::Base => 6,
            Self::Haz => 18,
            Self::Weld => 9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Haz => "haz",
            Self::Weld => "weld",
        }
    }
}

/// One row of the hardness table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample_id: String,
    pub heat_no: String,
    pub base: Vec<u64>,
    pub haz: Vec<u64>,
    pub weld: Vec<u64>,
    pub remarks: String,
}

impl SampleRecord {
    pub fn group(&self, group: MeasurementGroup) -> &[u64] {
        match group {
            MeasurementGroup::Base => &self.base,
            MeasurementGroup::Haz => &self.haz,
            MeasurementGroup::Weld => &self.weld,
        }
    }
}

/// Everything parsed out of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub summary: SummaryRecord,
    pub standard: StandardBlockRecord,
    pub samples: Vec<SampleRecord>,
}

/// Counters for anomalies the parser recovered from by omission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    pub sections_found: usize,
    pub rows_seen: usize,
    pub rows_dropped: usize,
    pub tokens_dropped: usize,
}
