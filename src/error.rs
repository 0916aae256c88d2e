use thiserror::Error;

/// Errors raised by the portal core.
///
/// Lookup misses (student absent from the roster, deadline not found) are
/// not errors; they have documented fallbacks at the call sites.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("worksheet `{0}` not found")]
    WorksheetNotFound(String),

    #[error("worksheet `{worksheet}` has no `{column}` column")]
    MissingColumn { worksheet: String, column: String },

    #[error("submission `{0}` not found")]
    SubmissionNotFound(String),

    #[error("row {row} is outside worksheet `{worksheet}`")]
    RowOutOfRange { worksheet: String, row: usize },

    #[error("failed to access worksheet `{worksheet}`: {source}")]
    Io {
        worksheet: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed csv in worksheet `{worksheet}`: {source}")]
    Csv {
        worksheet: String,
        #[source]
        source: csv::Error,
    },

    #[error("state store error: {0}")]
    State(#[from] sqlx::Error),
}

impl PortalError {
    pub fn missing_column(worksheet: &str, column: &str) -> Self {
        PortalError::MissingColumn {
            worksheet: worksheet.to_string(),
            column: column.to_string(),
        }
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
