//! Turns downloaded spreadsheet bytes into alert rows.

use crate::decoder::error::DecodeError;
use crate::model::AlertRow;

pub mod error;
pub mod workbook;

/// Header names of the two columns an alert sheet must carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertColumns {
    pub recipient: String,
    pub message: String,
}

impl AlertColumns {
    pub fn new(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            message: message.into(),
        }
    }

    /// Maps a table whose first row is the header onto alert rows, in order.
    ///
    /// Rows where both fields are blank are dropped.
    pub fn rows_from_table<R, C>(&self, table: R) -> Result<Vec<AlertRow>, DecodeError>
    where
        R: IntoIterator<Item = Vec<C>>,
        C: AsRef<str>,
    {
        let mut rows = table.into_iter();
        let header = rows.next().unwrap_or_default();

        let position = |column: &str| {
            header
                .iter()
                .position(|cell| cell.as_ref().trim() == column)
                .ok_or_else(|| DecodeError::MissingColumn {
                    column: column.to_string(),
                })
        };
        let recipient_idx = position(&self.recipient)?;
        let message_idx = position(&self.message)?;

        Ok(rows
            .map(|row| AlertRow::new(cell(&row, recipient_idx), cell(&row, message_idx)))
            .filter(|row| !(row.recipient_key.is_empty() && row.message_text.is_empty()))
            .collect())
    }
}

fn cell<C: AsRef<str>>(row: &[C], idx: usize) -> &str {
    row.get(idx).map(|c| c.as_ref()).unwrap_or("")
}

/// Decodes a spreadsheet file into alert rows.
pub trait SheetDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<AlertRow>, DecodeError>;
}
