//! Positional writer: puts an [`ExtractionResult`] into the template's fixed cells.
//!
//! Uses umya-spreadsheet so the template's formatting, merged cells and
//! borders survive the round trip. Cells are 1-based `(column, row)`.

use crate::error::PipelineError;
use crate::layout::{column_letters, FieldCell, SheetLayout, TableColumns};
use crate::observation::{ExtractionResult, MeasurementGroup, SampleRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};
use umya_spreadsheet::Worksheet;

/// What was written, for logging and response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub summary_cells: usize,
    pub standard_cells: usize,
    pub sample_rows: usize,
    pub readings: usize,
    /// Groups longer than their nominal length (written past their block, or truncated in strict mode).
    pub oversized_groups: usize,
}

/// Writes extraction results into sheets laid out per a [`SheetLayout`].
#[derive(Debug, Clone)]
pub struct SheetWriter {
    layout: SheetLayout,
    columns: TableColumns,
    strict_groups: bool,
}

impl SheetWriter {
    pub fn new(layout: SheetLayout) -> Result<Self, PipelineError> {
        layout.validate().map_err(PipelineError::Layout)?;
        let columns = layout.table.resolve().map_err(PipelineError::Layout)?;
        Ok(Self {
            layout,
            columns,
            strict_groups: false,
        })
    }

    /// Truncate each measurement group to its nominal length before writing.
    ///
    /// Off by default: an oversized group then runs on into the next group's
    /// columns, exactly as many readings as were transcribed.
    pub fn with_strict_groups(mut self, strict: bool) -> Self {
        self.strict_groups = strict;
        self
    }

    /// Load `template`, fill it, and save the result to `output`.
    ///
    /// A failed save removes whatever was written at `output`.
    pub fn populate(
        &self,
        result: &ExtractionResult,
        template: &Path,
        output: &Path,
    ) -> Result<WriteReport, PipelineError> {
        let mut book =
            umya_spreadsheet::reader::xlsx::read(template).map_err(|e| PipelineError::Template {
                path: template.to_path_buf(),
                source: e,
            })?;

        let sheet = book
            .get_sheet_mut(&0)
            .ok_or_else(|| PipelineError::NoWorksheet(template.to_path_buf()))?;

        let report = self.fill(sheet, result);

        if let Err(e) = umya_spreadsheet::writer::xlsx::write(&book, output) {
            if output.exists() {
                let _ = std::fs::remove_file(output);
            }
            return Err(PipelineError::Output {
                path: output.to_path_buf(),
                source: e,
            });
        }

        info!(
            "Saved {:?}: {} summary, {} standard, {} sample rows ({} readings)",
            output, report.summary_cells, report.standard_cells, report.sample_rows, report.readings
        );

        Ok(report)
    }

    /// Write `result` into `sheet` in place. Labels missing from the result
    /// leave their template cells untouched.
    pub fn fill(&self, sheet: &mut Worksheet, result: &ExtractionResult) -> WriteReport {
        let mut report = WriteReport {
            summary_cells: write_fields(sheet, &self.layout.summary_cells, &result.summary),
            standard_cells: write_fields(sheet, &self.layout.standard_cells, &result.standard),
            ..Default::default()
        };

        for (idx, sample) in result.samples.iter().enumerate() {
            let row = self.columns.start_row + idx as u32;
            self.write_sample(sheet, row, idx as u32 + 1, sample, &mut report);
            report.sample_rows += 1;
        }

        report
    }

    fn write_sample(
        &self,
        sheet: &mut Worksheet,
        row: u32,
        serial: u32,
        sample: &SampleRecord,
        report: &mut WriteReport,
    ) {
        let cols = &self.columns;

        sheet
            .get_cell_mut((cols.serial, row))
            .set_value_number(serial);
        sheet
            .get_cell_mut((cols.sample_id, row))
            .set_value_string(sample.sample_id.as_str());
        sheet
            .get_cell_mut((cols.heat_no, row))
            .set_value_string(sample.heat_no.as_str());

        for group in MeasurementGroup::ALL {
            let mut values = sample.group(group);
            let nominal = group.nominal_len();

            if values.len() > nominal {
                report.oversized_groups += 1;
                if self.strict_groups {
                    warn!(
                        "Row {}: {} has {} readings, truncating to {}",
                        row,
                        group.label(),
                        values.len(),
                        nominal
                    );
                    values = &values[..nominal];
                } else {
                    warn!(
                        "Row {}: {} has {} readings (nominal {}), writing through column {}",
                        row,
                        group.label(),
                        values.len(),
                        nominal,
                        column_letters(cols.group_start(group) + values.len() as u32 - 1)
                    );
                }
            }

            let start = cols.group_start(group);
            for (offset, value) in values.iter().enumerate() {
                sheet
                    .get_cell_mut((start + offset as u32, row))
                    .set_value_number(*value as f64);
            }
            report.readings += values.len();
        }

        sheet
            .get_cell_mut((cols.remarks, row))
            .set_value_string(sample.remarks.as_str());

        debug!("Wrote sample {} ({}) to row {}", serial, sample.sample_id, row);
    }
}

fn write_fields(
    sheet: &mut Worksheet,
    fields: &[FieldCell],
    values: &BTreeMap<String, String>,
) -> usize {
    let mut written = 0;
    for field in fields {
        if let Some(value) = values.get(&field.label) {
            sheet
                .get_cell_mut(field.cell.as_str())
                .set_value_string(value.as_str());
            written += 1;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown_parser::parse_markdown;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const TWO_SAMPLE_DOC: &str = "\
### 1. Test Summary Information
**Testing Laboratory:** Central QA Lab
**Document Title:** Observation Sheet (Mechanical - Vickers Hardness Test)
**Format No.:** QA/F/115
**Specification & Grade:** API 5L X65 PSL2
**Test Method:** ASTM E384
**Pipe Size:** 406.4 x 12.7 mm
**Atmospheric Conditions:** 24C / 55% RH
**Date & Shift:** 12/03/2025 - A
**Requirements:** 250 HV10 max
**M/C No.:** VH-02
---
### 2. Verification with Standard Block
**Standard Block ID No.:** VB-221
**Standard Block Value:** 240
**Reading 1:** 238
**Reading 2:** 241
**Reading 3:** 240
**Reading 4:** 239
**Reading 5:** 242
**Average (AVG):** 240
**% Of Error:** 0.0
**Remark:** Satisfactory
---
### 3. Extracted Hardness Values Table
| Sr. No. | Sample ID No. | Heat No. | Base (Points 1-6) | HAZ (Points 7-24) | Weld (Points 25-33) | Remarks |
|---|---|---|---|---|---|---|
| 7 | W-01 | H8812 | 180, 182, 185, 181, 183, 184 | 201, 202, 203 | 215, 216 | Accepted |
| 9 | W-02 | H8813 | 179, 181 | 205 | 220, 221, 222 | Accepted |
";

    fn make_template(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("template.xlsx");
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();
        sheet.get_cell_mut("A1").set_value_string("OBSERVATION SHEET");
        sheet.get_cell_mut("E5").set_value_string("template default");
        sheet.get_cell_mut("E14").set_value_string("template remark");
        umya_spreadsheet::writer::xlsx::write(&book, &path).unwrap();
        path
    }

    fn read_back(path: &Path) -> calamine::Range<Data> {
        let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
        workbook.worksheet_range_at(0).unwrap().unwrap()
    }

    /// Text of an A1 address, numbers rendered without a trailing ".0".
    fn cell(range: &calamine::Range<Data>, address: &str) -> String {
        let (col, row) = crate::layout::parse_cell_ref(address).unwrap();
        match range.get_value((row - 1, col - 1)) {
            Some(Data::String(s)) => s.clone(),
            Some(Data::Float(f)) => format!("{}", *f as i64),
            Some(Data::Int(i)) => i.to_string(),
            Some(Data::Empty) | None => String::new(),
            Some(other) => format!("{:?}", other),
        }
    }

    fn writer() -> SheetWriter {
        SheetWriter::new(SheetLayout::vickers()).unwrap()
    }

    #[test]
    fn test_end_to_end_two_samples() {
        let dir = TempDir::new().unwrap();
        let template = make_template(&dir);
        let output = dir.path().join("out.xlsx");

        let result = parse_markdown(TWO_SAMPLE_DOC);
        let report = writer().populate(&result, &template, &output).unwrap();

        assert_eq!(report.summary_cells, 10);
        assert_eq!(report.standard_cells, 10);
        assert_eq!(report.sample_rows, 2);
        assert_eq!(report.readings, 11 + 6);
        assert_eq!(report.oversized_groups, 0);

        let range = read_back(&output);
        assert_eq!(cell(&range, "A1"), "OBSERVATION SHEET");
        assert_eq!(cell(&range, "B5"), "Central QA Lab");
        assert_eq!(cell(&range, "B9"), "ASTM E384");
        assert_eq!(cell(&range, "B16"), "VH-02");
        assert_eq!(cell(&range, "E5"), "VB-221");
        assert_eq!(cell(&range, "E12"), "240");
        assert_eq!(cell(&range, "E14"), "Satisfactory");

        // Serial numbers regenerated from row order, not the source's 7 and 9.
        assert_eq!(cell(&range, "A17"), "1");
        assert_eq!(cell(&range, "B17"), "W-01");
        assert_eq!(cell(&range, "C17"), "H8812");
        assert_eq!(cell(&range, "D17"), "180");
        assert_eq!(cell(&range, "I17"), "184");
        assert_eq!(cell(&range, "J17"), "201");
        assert_eq!(cell(&range, "L17"), "203");
        assert_eq!(cell(&range, "AB17"), "215");
        assert_eq!(cell(&range, "AC17"), "216");
        assert_eq!(cell(&range, "AK17"), "Accepted");

        assert_eq!(cell(&range, "A18"), "2");
        assert_eq!(cell(&range, "B18"), "W-02");
        assert_eq!(cell(&range, "E18"), "181");
        assert_eq!(cell(&range, "F18"), "");
        assert_eq!(cell(&range, "J18"), "205");
        assert_eq!(cell(&range, "AD18"), "222");
    }

    #[test]
    fn test_missing_standard_block_keeps_template_defaults() {
        let dir = TempDir::new().unwrap();
        let template = make_template(&dir);
        let output = dir.path().join("out.xlsx");

        let doc = "### 1. Test Summary Information\n**Pipe Size:** 8 in\n---\n";
        let result = parse_markdown(doc);
        assert!(result.standard.is_empty());

        let report = writer().populate(&result, &template, &output).unwrap();
        assert_eq!(report.standard_cells, 0);
        assert_eq!(report.summary_cells, 1);

        let range = read_back(&output);
        assert_eq!(cell(&range, "B12"), "8 in");
        assert_eq!(cell(&range, "E5"), "template default");
        assert_eq!(cell(&range, "E14"), "template remark");
    }

    #[test]
    fn test_oversized_base_overlaps_haz_columns() {
        let dir = TempDir::new().unwrap();
        let template = make_template(&dir);
        let output = dir.path().join("out.xlsx");

        let result = ExtractionResult {
            samples: vec![SampleRecord {
                sample_id: "S-1".to_string(),
                base: vec![101, 102, 103, 104, 105, 106, 107, 108],
                ..Default::default()
            }],
            ..Default::default()
        };

        let report = writer().populate(&result, &template, &output).unwrap();
        assert_eq!(report.oversized_groups, 1);
        assert_eq!(report.readings, 8);

        let range = read_back(&output);
        for (offset, column) in ["D", "E", "F", "G", "H", "I", "J", "K"].iter().enumerate() {
            assert_eq!(cell(&range, &format!("{}17", column)), (101 + offset).to_string());
        }
    }

    #[test]
    fn test_later_group_overwrites_overlap() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();

        let result = ExtractionResult {
            samples: vec![SampleRecord {
                base: vec![1, 2, 3, 4, 5, 6, 7, 8],
                haz: vec![50],
                ..Default::default()
            }],
            ..Default::default()
        };
        writer().fill(sheet, &result);

        // J is haz's first column; base[6] was written there first.
        assert_eq!(sheet.get_value("J17"), "50");
        assert_eq!(sheet.get_value("K17"), "8");
    }

    #[test]
    fn test_strict_groups_truncate() {
        let dir = TempDir::new().unwrap();
        let template = make_template(&dir);
        let output = dir.path().join("out.xlsx");

        let result = ExtractionResult {
            samples: vec![SampleRecord {
                base: vec![101, 102, 103, 104, 105, 106, 107, 108],
                ..Default::default()
            }],
            ..Default::default()
        };

        let report = writer()
            .with_strict_groups(true)
            .populate(&result, &template, &output)
            .unwrap();
        assert_eq!(report.oversized_groups, 1);
        assert_eq!(report.readings, 6);

        let range = read_back(&output);
        assert_eq!(cell(&range, "I17"), "106");
        assert_eq!(cell(&range, "J17"), "");
        assert_eq!(cell(&range, "K17"), "");
    }

    #[test]
    fn test_unknown_labels_ignored() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();

        let mut result = ExtractionResult::default();
        result
            .summary
            .insert("Customer".to_string(), "ACME Pipes".to_string());
        result
            .summary
            .insert("Test Method".to_string(), "ASTM E92".to_string());

        let report = writer().fill(sheet, &result);
        assert_eq!(report.summary_cells, 1);
        assert_eq!(sheet.get_value("B9"), "ASTM E92");
    }

    #[test]
    fn test_missing_template_is_error() {
        let dir = TempDir::new().unwrap();
        let err = writer()
            .populate(
                &ExtractionResult::default(),
                &dir.path().join("missing.xlsx"),
                &dir.path().join("out.xlsx"),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Template { .. }));
        assert!(!dir.path().join("out.xlsx").exists());
    }

    #[test]
    fn test_unwritable_output_is_error() {
        let dir = TempDir::new().unwrap();
        let template = make_template(&dir);
        let output = dir.path().join("no_such_dir").join("out.xlsx");

        let err = writer()
            .populate(&parse_markdown(TWO_SAMPLE_DOC), &template, &output)
            .unwrap_err();

        assert!(matches!(err, PipelineError::Output { .. }));
        assert!(!output.exists());
        assert!(template.exists());
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let mut layout = SheetLayout::vickers();
        layout.table.weld_column = "1".to_string();
        assert!(matches!(
            SheetWriter::new(layout),
            Err(PipelineError::Layout(_))
        ));
    }
}
