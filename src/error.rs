use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("no records found: {0}")]
    NoData(String),
    #[error("report generation exceeded {0} ms")]
    Timeout(u64),
    #[error("{0}")]
    InvalidInput(String),
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl ReportError {
    /// Stable protocol code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::NotFound(_) => "not_found",
            ReportError::NoData(_) => "no_data",
            ReportError::Timeout(_) => "timeout",
            ReportError::InvalidInput(_) => "bad_params",
            ReportError::Store(_) => "db_query_failed",
        }
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
