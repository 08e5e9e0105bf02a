//! Error types for parsing, storage and the per-URL scrape
//!
//! Parse and storage failures are never retried. Only navigation and
//! content-wait failures are treated as transient.

use thiserror::Error;

use crate::domain::ErrorKind;

/// Failure turning page markup into records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Document is empty")]
    EmptyDocument,

    #[error("Not a product page: none of the title selectors matched ({tried})")]
    UnrecognizedPage { tried: String },

    #[error("Invalid CSS selector '{selector}' for {field}: {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },
}

impl ParseError {
    pub fn unrecognized_page(tried: &[String]) -> Self {
        Self::UnrecognizedPage {
            tried: tried.join(", "),
        }
    }

    pub fn invalid_selector(field: &str, selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Failure reading or writing the local store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to prepare database location {path}: {source}")]
    Location {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored value in column '{column}' is invalid: {reason}")]
    Corrupt { column: String, reason: String },
}

/// Failure of one URL's scrape, classified by [`ErrorKind`]
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Content selector '{selector}' did not appear within {timeout_ms}ms")]
    ContentTimeout { selector: String, timeout_ms: u64 },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Task exceeded its {0}s time budget")]
    TimedOut(u64),

    #[error("Cancelled by shutdown request")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    pub fn navigation(url: &str, message: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub fn content_timeout(selector: &str, timeout_ms: u64) -> Self {
        Self::ContentTimeout {
            selector: selector.to_string(),
            timeout_ms,
        }
    }

    pub fn browser(message: impl ToString) -> Self {
        Self::Browser(message.to_string())
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Navigation { .. } => ErrorKind::Navigation,
            Self::ContentTimeout { .. } => ErrorKind::ContentTimeout,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Browser(_) => ErrorKind::Browser,
            Self::TimedOut(_) => ErrorKind::TimedOut,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Transient page-load failures; everything else escalates immediately
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Navigation { .. } | Self::ContentTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_load_failures_are_retryable() {
        assert!(ScrapeError::navigation("https://a", "dns").is_retryable());
        assert!(ScrapeError::content_timeout("h1", 100).is_retryable());
        assert!(!ScrapeError::Parse(ParseError::EmptyDocument).is_retryable());
        assert!(!ScrapeError::browser("launch").is_retryable());
        assert!(!ScrapeError::TimedOut(5).is_retryable());
        assert!(!ScrapeError::Cancelled.is_retryable());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ScrapeError::navigation("u", "x").kind(), ErrorKind::Navigation);
        assert_eq!(
            ScrapeError::from(ParseError::unrecognized_page(&["h1".to_string()])).kind(),
            ErrorKind::Parse
        );
        assert_eq!(
            ScrapeError::from(StorageError::Corrupt {
                column: "availability".to_string(),
                reason: "bad".to_string()
            })
            .kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_error_messages() {
        let err = ParseError::unrecognized_page(&["h1.a".to_string(), "h1.b".to_string()]);
        assert_eq!(
            err.to_string(),
            "Not a product page: none of the title selectors matched (h1.a, h1.b)"
        );
        assert_eq!(
            ScrapeError::content_timeout("h1.product-title", 45000).to_string(),
            "Content selector 'h1.product-title' did not appear within 45000ms"
        );
    }
}
