//! Cell geometry of the observation sheet template.
//!
//! Pure data: which cell each summary/standard label goes to, and which
//! column each part of a sample row starts at. Moving a field in the
//! template is an edit here (or in the layout JSON), not in the writer.

use crate::observation::MeasurementGroup;
use serde::{Deserialize, Serialize};

/// A bold label and the fixed cell its value is written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCell {
    pub label: String,
    pub cell: String,
}

impl FieldCell {
    fn new(label: &str, cell: &str) -> Self {
        Self {
            label: label.to_string(),
            cell: cell.to_string(),
        }
    }
}

/// Column letters for the hardness table, one row per sample from `start_row`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    pub start_row: u32,
    pub serial_column: String,
    pub sample_id_column: String,
    pub heat_no_column: String,
    pub base_column: String,
    pub haz_column: String,
    pub weld_column: String,
    pub remarks_column: String,
}

/// [`TableLayout`] with letters resolved to 1-based column numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableColumns {
    pub start_row: u32,
    pub serial: u32,
    pub sample_id: u32,
    pub heat_no: u32,
    pub base: u32,
    pub haz: u32,
    pub weld: u32,
    pub remarks: u32,
}

impl TableColumns {
    pub fn group_start(&self, group: MeasurementGroup) -> u32 {
        match group {
            MeasurementGroup::Base => self.base,
            MeasurementGroup::Haz => self.haz,
            MeasurementGroup::Weld => self.weld,
        }
    }
}

impl TableLayout {
    pub fn resolve(&self) -> Result<TableColumns, String> {
        let col = |letters: &str| {
            column_number(letters).ok_or_else(|| format!("Invalid column letters: {:?}", letters))
        };
        if self.start_row == 0 {
            return Err("Table start row must be 1 or greater".to_string());
        }
        Ok(TableColumns {
            start_row: self.start_row,
            serial: col(&self.serial_column)?,
            sample_id: col(&self.sample_id_column)?,
            heat_no: col(&self.heat_no_column)?,
            base: col(&self.base_column)?,
            haz: col(&self.haz_column)?,
            weld: col(&self.weld_column)?,
            remarks: col(&self.remarks_column)?,
        })
    }
}

/// Full template geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub summary_cells: Vec<FieldCell>,
    pub standard_cells: Vec<FieldCell>,
    pub table: TableLayout,
}

impl SheetLayout {
    /// Geometry of "TEMPLATE MTC - Single Sheet.xlsx".
    pub fn vickers() -> Self {
        Self {
            summary_cells: vec![
                FieldCell::new("Testing Laboratory", "B5"),
                FieldCell::new("Document Title", "B6"),
                FieldCell::new("Format No.", "B7"),
                FieldCell::new("Specification & Grade", "B8"),
                FieldCell::new("Test Method", "B9"),
                FieldCell::new("Pipe Size", "B12"),
                FieldCell::new("Atmospheric Conditions", "B13"),
                FieldCell::new("Date & Shift", "B14"),
                FieldCell::new("Requirements", "B15"),
                FieldCell::new("M/C No.", "B16"),
            ],
            standard_cells: vec![
                FieldCell::new("Standard Block ID No.", "E5"),
                FieldCell::new("Standard Block Value", "E6"),
                FieldCell::new("Reading 1", "E7"),
                FieldCell::new("Reading 2", "E8"),
                FieldCell::new("Reading 3", "E9"),
                FieldCell::new("Reading 4", "E10"),
                FieldCell::new("Reading 5", "E11"),
                FieldCell::new("Average (AVG)", "E12"),
                FieldCell::new("% Of Error", "E13"),
                FieldCell::new("Remark", "E14"),
            ],
            table: TableLayout {
                start_row: 17,
                serial_column: "A".to_string(),
                sample_id_column: "B".to_string(),
                heat_no_column: "C".to_string(),
                base_column: "D".to_string(),
                haz_column: "J".to_string(),
                weld_column: "AB".to_string(),
                remarks_column: "AK".to_string(),
            },
        }
    }

    /// Check every address parses. Called once when the layout is loaded.
    pub fn validate(&self) -> Result<(), String> {
        for field in self.summary_cells.iter().chain(&self.standard_cells) {
            if parse_cell_ref(&field.cell).is_none() {
                return Err(format!(
                    "Invalid cell address {:?} for label {:?}",
                    field.cell, field.label
                ));
            }
        }
        self.table.resolve().map(|_| ())
    }
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self::vickers()
    }
}

/// Column letters to 1-based number (A→1, Z→26, AA→27).
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        c.is_ascii_alphabetic()
            .then(|| acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1))
    })
}

/// 1-based column number to letters (1→A, 26→Z, 27→AA).
pub fn column_letters(number: u32) -> String {
    let mut n = number;
    let mut s = String::new();
    while n > 0 {
        let r = ((n - 1) % 26) as u8;
        s.insert(0, (b'A' + r) as char);
        n = (n - 1) / 26;
    }
    s
}

/// Split an A1-style address into 1-based `(column, row)`.
pub fn parse_cell_ref(cell: &str) -> Option<(u32, u32)> {
    let cell = cell.trim();
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    let column = column_number(letters)?;
    let row: u32 = digits.parse().ok()?;
    (row > 0).then_some((column, row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_number() {
        assert_eq!(column_number("A"), Some(1));
        assert_eq!(column_number("J"), Some(10));
        assert_eq!(column_number("AB"), Some(28));
        assert_eq!(column_number("ak"), Some(37));
        assert_eq!(column_number(""), None);
        assert_eq!(column_number("A1"), None);
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(37), "AK");
        assert_eq!(column_letters(703), "AAA");
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("B5"), Some((2, 5)));
        assert_eq!(parse_cell_ref("E14"), Some((5, 14)));
        assert_eq!(parse_cell_ref("AK17"), Some((37, 17)));
        assert_eq!(parse_cell_ref("B0"), None);
        assert_eq!(parse_cell_ref("17"), None);
        assert_eq!(parse_cell_ref("B"), None);
    }

    #[test]
    fn test_vickers_layout_resolves() {
        let layout = SheetLayout::vickers();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.summary_cells.len(), 10);
        assert_eq!(layout.standard_cells.len(), 10);

        let cols = layout.table.resolve().unwrap();
        assert_eq!(cols.start_row, 17);
        assert_eq!(cols.serial, 1);
        assert_eq!(cols.group_start(MeasurementGroup::Base), 4);
        assert_eq!(cols.group_start(MeasurementGroup::Haz), 10);
        assert_eq!(cols.group_start(MeasurementGroup::Weld), 28);
        assert_eq!(cols.remarks, 37);
    }

    #[test]
    fn test_nominal_groups_fit_between_start_columns() {
        let cols = SheetLayout::vickers().table.resolve().unwrap();
        assert_eq!(cols.base + MeasurementGroup::Base.nominal_len() as u32, cols.haz);
        assert_eq!(cols.haz + MeasurementGroup::Haz.nominal_len() as u32, cols.weld);
        assert_eq!(cols.weld + MeasurementGroup::Weld.nominal_len() as u32, cols.remarks);
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let mut layout = SheetLayout::vickers();
        layout.table.haz_column = "J9".to_string();
        assert!(layout.validate().is_err());

        let mut layout = SheetLayout::vickers();
        layout.summary_cells[0].cell = "nowhere".to_string();
        assert!(layout.validate().is_err());
    }
}
