#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("Failed to open workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook contains no worksheet.")]
    NoWorksheet,

    #[error("Required column `{column}` is missing from the header row.")]
    MissingColumn { column: String },
}
