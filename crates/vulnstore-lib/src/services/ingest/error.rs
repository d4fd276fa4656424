// Ingest Service Error Types

use thiserror::Error;

/// Ingest Service Error
#[derive(Error, Debug)]
pub enum IngestError {
    /// Batch was called without a source or without files
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Fetch target is outside the trusted prefix
    #[error("Untrusted source URL: {source_url}")]
    InvalidSource { source_url: String },

    /// All fetch attempts failed
    #[error("Failed to fetch {url} after {attempts} attempts: {message}")]
    FetchFailed {
        url: String,
        attempts: u32,
        message: String,
    },

    /// Payload is not a JSON array of scan reports
    #[error("Failed to parse {file_name}: {message}")]
    ParseFailed { file_name: String, message: String },

    /// A sub-write failed and the scan's transaction was rolled back
    #[error("Failed to persist scan {scan_id}: {message}")]
    PersistFailed { scan_id: String, message: String },

    /// Blocking storage task could not complete
    #[error("Storage task failed: {message}")]
    Storage { message: String },
}

/// Result type for ingest operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Stable ingest error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestErrorCode {
    InvalidRequest,
    InvalidSource,
    FetchFailed,
    ParseFailed,
    PersistFailed,
    Storage,
}

impl IngestErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestErrorCode::InvalidRequest => "INGEST_INVALID_REQUEST",
            IngestErrorCode::InvalidSource => "INGEST_INVALID_SOURCE",
            IngestErrorCode::FetchFailed => "INGEST_FETCH_FAILED",
            IngestErrorCode::ParseFailed => "INGEST_PARSE_FAILED",
            IngestErrorCode::PersistFailed => "INGEST_PERSIST_FAILED",
            IngestErrorCode::Storage => "INGEST_STORAGE_ERROR",
        }
    }
}

impl IngestError {
    pub fn code(&self) -> IngestErrorCode {
        match self {
            IngestError::InvalidRequest { .. } => IngestErrorCode::InvalidRequest,
            IngestError::InvalidSource { .. } => IngestErrorCode::InvalidSource,
            IngestError::FetchFailed { .. } => IngestErrorCode::FetchFailed,
            IngestError::ParseFailed { .. } => IngestErrorCode::ParseFailed,
            IngestError::PersistFailed { .. } => IngestErrorCode::PersistFailed,
            IngestError::Storage { .. } => IngestErrorCode::Storage,
        }
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        IngestError::InvalidRequest {
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::Storage {
            message: err.to_string(),
        }
    }
}
