//! Error types reported by ontology providers.

use thiserror::Error;

/// Errors raised by a provider's text search engine.
///
/// These are domain errors: they describe a problem with the query or the
/// index rather than a fault in the provider itself, and callers are expected
/// to match on them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The query was rejected by the search engine's parser.
    #[error("malformed search query '{query}': {message}")]
    MalformedQuery {
        /// The query as submitted.
        query: String,
        /// Description of the parse failure.
        message: String,
    },

    /// The provider has no usable search index.
    #[error("search index unavailable for {0}")]
    IndexUnavailable(String),

    /// Any other search engine failure.
    #[error("search failed: {0}")]
    Backend(String),
}

/// Errors that can occur while a provider answers a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// A domain search error, carried unchanged.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// The provider failed to answer the query.
    #[error("ontology query failed: {0}")]
    Query(String),

    /// The query observed its cancellation token and stopped.
    #[error("query cancelled")]
    Cancelled,

    /// The provider panicked while answering.
    #[error("provider panicked: {0}")]
    Panicked(String),
}

impl ProviderError {
    /// Creates a query failure from any displayable message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Returns the search error if this is one.
    pub fn as_search(&self) -> Option<&SearchError> {
        match self {
            Self::Search(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_malformed_query() {
        let err = SearchError::MalformedQuery {
            query: "brain AND (".to_string(),
            message: "unbalanced parenthesis".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed search query 'brain AND (': unbalanced parenthesis"
        );
    }

    #[test]
    fn test_search_error_is_transparent() {
        let err: ProviderError = SearchError::Backend("index corrupt".to_string()).into();
        assert_eq!(err.to_string(), "search failed: index corrupt");
        assert!(err.as_search().is_some());
    }

    #[test]
    fn test_query_error() {
        let err = ProviderError::query("reasoner offline");
        assert_eq!(err.to_string(), "ontology query failed: reasoner offline");
        assert!(err.as_search().is_none());
    }
}
