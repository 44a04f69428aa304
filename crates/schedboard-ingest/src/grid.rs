//! Dense cell grid built from a calamine range
//!
//! calamine ranges start at the first used cell; the grid re-anchors them at
//! A1 so schema offsets apply directly.

use calamine::{Data, Range};
use schedboard_core::fields::{excel_serial_to_datetime, CellValue};

static EMPTY: CellValue = CellValue::Empty;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    pub fn from_range(range: &Range<Data>) -> Self {
        let Some((start_row, start_col)) = range.start() else {
            return Self::default();
        };
        let (height, _) = range.get_size();
        let mut rows = vec![Vec::new(); start_row as usize + height];
        for (row, col, data) in range.used_cells() {
            let value = convert(data);
            if value == CellValue::Empty {
                continue;
            }
            let abs_row = start_row as usize + row;
            let abs_col = start_col as usize + col;
            let cells = &mut rows[abs_row];
            if cells.len() <= abs_col {
                cells.resize(abs_col + 1, CellValue::Empty);
            }
            cells[abs_col] = value;
        }
        Self { rows }
    }

    /// Number of rows, counting leading empty rows
    pub fn height(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(CellValue::is_blank))
    }

    pub fn cell(&self, row: u32, col: u32) -> &CellValue {
        self.rows
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .unwrap_or(&EMPTY)
    }

    pub fn row(&self, row: u32) -> &[CellValue] {
        self.rows.get(row as usize).map_or(&[], Vec::as_slice)
    }
}

/// Map a calamine value onto the reader-independent cell model
pub fn convert(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_datetime(serial).map_or(CellValue::Number(serial), CellValue::Date)
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
