use std::fmt;

use thiserror::Error;

/// Errors raised by identifier parsing, HTTP lookups and text extraction.
#[derive(Debug, Error)]
pub enum ScienceError {
    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("invalid ISBN: {0}")]
    InvalidIsbn(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] biblioscope_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ScienceError>;

/// An input-intrinsic reason a job cannot succeed. Never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainFailure {
    FileNotFound,
    HasParent,
    UnreadablePdf,
    NoUsableText,
    RateLimited,
}

impl DomainFailure {
    /// User-facing text shown in the job row.
    pub fn message(&self) -> &'static str {
        match self {
            Self::FileNotFound => "The attachment file could not be found",
            Self::HasParent => "The attachment already has a parent item",
            Self::UnreadablePdf => "The PDF could not be read",
            Self::NoUsableText => "The PDF does not contain usable text (it may need OCR)",
            Self::RateLimited => "The metadata service limited requests; try again later",
        }
    }
}

impl fmt::Display for DomainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome classification for a failed recognition attempt.
#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("{0}")]
    Domain(DomainFailure),

    /// Transient infrastructure failure; the job is retried after backoff.
    #[error("{0}")]
    Recoverable(String),
}

impl RecognizeError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }
}

impl From<DomainFailure> for RecognizeError {
    fn from(failure: DomainFailure) -> Self {
        Self::Domain(failure)
    }
}

impl From<ScienceError> for RecognizeError {
    fn from(err: ScienceError) -> Self {
        match err {
            ScienceError::RateLimit(..) => Self::Domain(DomainFailure::RateLimited),
            ScienceError::PdfExtraction(_) => Self::Domain(DomainFailure::UnreadablePdf),
            other => Self::Recoverable(other.to_string()),
        }
    }
}

impl From<biblioscope_core::CoreError> for RecognizeError {
    fn from(err: biblioscope_core::CoreError) -> Self {
        Self::Recoverable(err.to_string())
    }
}
