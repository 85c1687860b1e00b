//! Query error types
//!
//! Structured error handling for query construction and execution. Errors of
//! kind [`QueryErrorKind::EmptyQuery`] and [`QueryErrorKind::InvalidSort`]
//! are configuration errors raised before any backend call; backend failures
//! are wrapped with kind [`QueryErrorKind::Backend`].

use std::fmt;

/// Query error with context
#[derive(Debug)]
pub struct QueryError {
    /// Error kind for programmatic handling
    pub kind: QueryErrorKind,
    /// Human-readable message
    pub message: String,
    /// Optional source error
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl QueryError {
    /// Create a new query error
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Add source error for error chaining
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create an empty-query error
    pub fn empty_query() -> Self {
        Self::new(
            QueryErrorKind::EmptyQuery,
            "no series added to the query; add at least one series before this operation",
        )
    }

    /// Create an invalid-sort error carrying the rejected token
    pub fn invalid_sort(token: impl fmt::Display) -> Self {
        Self::new(
            QueryErrorKind::InvalidSort,
            format!("sort must be 'asc' or 'desc', received '{}'", token),
        )
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::ValidationError, message)
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Backend, message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Categories of query errors for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Operation requires at least one series in the query
    EmptyQuery,
    /// Sort parameter was not a recognized direction
    InvalidSort,
    /// Query parameters failed validation
    ValidationError,
    /// Search backend reported a failure
    Backend,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryErrorKind::EmptyQuery => write!(f, "EmptyQuery"),
            QueryErrorKind::InvalidSort => write!(f, "InvalidSort"),
            QueryErrorKind::ValidationError => write!(f, "ValidationError"),
            QueryErrorKind::Backend => write!(f, "Backend"),
        }
    }
}

/// Result type alias for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;
