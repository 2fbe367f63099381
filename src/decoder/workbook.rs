//! Spreadsheet decoding backed by calamine (xlsx, xls, ods).

use std::io::Cursor;

use calamine::Data;
use calamine::Reader;
use calamine::open_workbook_auto_from_rs;
use log::debug;

use crate::decoder::AlertColumns;
use crate::decoder::SheetDecoder;
use crate::decoder::error::DecodeError;
use crate::model::AlertRow;

/// Reads alert rows from the first worksheet of a workbook.
pub struct WorkbookDecoder {
    columns: AlertColumns,
}

impl WorkbookDecoder {
    pub fn new(columns: AlertColumns) -> Self {
        Self { columns }
    }

    /// Renders a cell the way it reads in the sheet.
    ///
    /// Phone numbers typed into a spreadsheet usually land as floats, so whole
    /// numbers are printed without a fractional part.
    fn cell_to_string(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Int(i) => i.to_string(),
            Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            other => other.to_string(),
        }
    }
}

impl SheetDecoder for WorkbookDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<AlertRow>, DecodeError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(DecodeError::NoWorksheet)??;

        debug!("Decoding worksheet with {} rows", range.height());
        let table = range
            .rows()
            .map(|row| row.iter().map(Self::cell_to_string).collect::<Vec<_>>());
        self.columns.rows_from_table(table)
    }
}
