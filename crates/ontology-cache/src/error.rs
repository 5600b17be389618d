//! Error types for the cache and service crate.

use ontology_coordinator::{CoordinatorError, ProviderId, SearchError};

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that can occur in the ontology service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// Coordinating the providers failed.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// No provider is registered under this id.
    #[error("unknown ontology provider: {0}")]
    UnknownProvider(ProviderId),
}

impl ServiceError {
    /// Returns the search error if a provider rejected a search query.
    pub fn as_search(&self) -> Option<&SearchError> {
        match self {
            Self::Coordinator(err) => err.as_search(),
            _ => None,
        }
    }

    /// Returns true if the error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Coordinator(CoordinatorError::Timeout { .. }))
    }
}
