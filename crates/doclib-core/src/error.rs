//! Error types for search operations.

use crate::store::GenerationMismatch;

/// Result type for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors surfaced by the search engine.
///
/// Everything except [`SearchError::Store`] is a caller mistake and maps
/// to a 4xx-class response.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Year range whose start is after its end.
    #[error("invalid year range: start {start} is after end {end}")]
    InvalidYearRange { start: i32, end: i32 },

    /// Year range token that is not `range_<start>_<end>`.
    #[error("invalid year range token: {0}")]
    MalformedYearRange(String),

    /// Filter key that names no known field.
    #[error("invalid filter key: {0}")]
    UnknownFilterKey(String),

    /// Page or page size below 1.
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),

    /// Ordering that is not `date`, `title`, or `relevance`.
    #[error("invalid order_by: {0}. Use date, title, or relevance.")]
    UnknownOrderBy(String),

    #[error("document not found: {0}")]
    DocumentNotFound(i64),

    /// Failure inside the backing store.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SearchError {
    /// True for errors caused by the request rather than the backend.
    pub fn is_validation(&self) -> bool {
        !matches!(self, SearchError::Store(_) | SearchError::DocumentNotFound(_))
    }

    /// True when the store moved to a new generation mid-request. Running
    /// the request again reads a fresh snapshot.
    pub fn is_store_changed(&self) -> bool {
        matches!(self, SearchError::Store(e) if e.is::<GenerationMismatch>())
    }
}
