//! Error types for the BIN resolver.
//!
//! Input problems, refresh-cycle problems and binary-level failures are kept
//! in separate enums so that a failed refresh can never leak into a lookup.

use thiserror::Error;

/// Result type alias for service-level operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Rejections produced while normalizing a caller-supplied card number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Nothing was supplied.
    #[error("card number cannot be empty")]
    EmptyInput,

    /// The first six characters are not all digits.
    #[error("card number must start with six digits")]
    MalformedBin,

    /// Fewer than 16 characters after mask substitution.
    #[error("card number must be at least 16 characters, got {length}")]
    TooShort { length: usize },

    /// Non-digit characters remain after mask substitution, or the value overflows.
    #[error("card number is not numeric")]
    NotNumeric,
}

/// Failures while producing a dataset from its source.
///
/// The variant is the cause tag reported by the refresher.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// The request did not complete within the configured timeout.
    #[error("request timed out for {url}")]
    Timeout { url: String },

    /// Local file system failure while saving or extracting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive is corrupt or unsupported.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// An archive entry would be written outside the extraction directory.
    #[error("archive entry escapes the extraction directory: {entry}")]
    PathTraversal { entry: String },

    /// The archive did not contain the expected JSON payload.
    #[error("dataset file {name} not found after extraction")]
    MissingPayload { name: String },

    /// The payload is not a JSON array of range rows.
    #[error("dataset decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Rejections of a bulk replace. The previous dataset is always retained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The incoming dataset has no usable records.
    #[error("refusing to replace the range table with an empty dataset")]
    EmptyDataset,
}

/// A failed refresh cycle.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("replace failed: {0}")]
    Store(#[from] StoreError),

    /// The fetcher or the replace panicked mid-cycle.
    #[error("refresh cycle panicked: {message}")]
    Panicked { message: String },
}

/// Errors surfaced by the command-line front end.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Failed to open or read an input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The dataset could not be loaded
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The dataset could not be installed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A refresh cycle aborted
    #[error("refresh aborted: {0}")]
    Refresh(String),
}

impl From<RefreshError> for ServiceError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Fetch(e) => ServiceError::Fetch(e),
            RefreshError::Store(e) => ServiceError::Store(e),
            RefreshError::Panicked { message } => ServiceError::Refresh(message),
        }
    }
}
