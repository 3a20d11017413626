use thiserror::Error;

use crate::feed::{FetchError, TimeTuple};
use crate::storage::DatabaseError;

/// Errors raised while extracting a feed into the store.
///
/// Status errors are raised before anything is written. Store errors pass
/// through unchanged.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The feed URL answered 404
    #[error("Feed not found: {url}")]
    NotFound { url: String },

    /// The feed URL answered 401
    #[error("Not authorized to read feed: {url}")]
    Unauthorized { url: String },

    /// Any status other than 200, 401 or 404
    #[error("Unexpected status {status} for feed: {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// The parser produced no document at all
    #[error("Failed to fetch feed {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// An entry carried a time that cannot be placed on the local clock
    #[error("Entry {entry_id} has an unrepresentable timestamp: {tuple:?}")]
    InvalidTimestamp { entry_id: String, tuple: TimeTuple },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ExtractionError {
    /// Map a non-OK parser status to its error.
    pub(crate) fn from_status(url: &str, status: u16) -> Self {
        match status {
            404 => ExtractionError::NotFound {
                url: url.to_string(),
            },
            401 => ExtractionError::Unauthorized {
                url: url.to_string(),
            },
            status => ExtractionError::UnexpectedStatus {
                url: url.to_string(),
                status,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ExtractionError::from_status("u", 404),
            ExtractionError::NotFound { .. }
        ));
        assert!(matches!(
            ExtractionError::from_status("u", 401),
            ExtractionError::Unauthorized { .. }
        ));
        assert!(matches!(
            ExtractionError::from_status("u", 203),
            ExtractionError::UnexpectedStatus { status: 203, .. }
        ));
    }

    #[test]
    fn test_database_error_is_transparent() {
        let err = ExtractionError::from(DatabaseError::InstanceLocked);
        assert_eq!(err.to_string(), DatabaseError::InstanceLocked.to_string());
    }
}
