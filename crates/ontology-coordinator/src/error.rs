//! Error types for provider coordination.

use std::time::Duration;

use ontology_model::{ProviderError, ProviderId, SearchError};
use thiserror::Error;

/// Errors that can occur while coordinating providers.
#[derive(Error, Debug, Clone)]
pub enum CoordinatorError {
    /// A provider failed while answering; the cause is preserved.
    #[error("provider {provider} failed: {source}")]
    Provider {
        /// The failing provider.
        provider: ProviderId,
        /// What went wrong.
        #[source]
        source: ProviderError,
    },

    /// A provider's search engine rejected the query.
    #[error("search failed in {provider}: {source}")]
    Search {
        /// The provider whose search failed.
        provider: ProviderId,
        /// The original search error.
        #[source]
        source: SearchError,
    },

    /// The configured timeout elapsed before all providers answered.
    #[error("{description} timed out after {elapsed:?}; still running: {}", .pending.join(", "))]
    Timeout {
        /// What was being waited for.
        description: String,
        /// Time spent waiting.
        elapsed: Duration,
        /// Providers that had not answered.
        pending: Vec<String>,
    },

    /// The executor dropped a task without running it.
    #[error("{description}: a task was dropped before reporting a result")]
    TaskLost {
        /// What was being waited for.
        description: String,
    },

    /// A provider with the same id is already registered.
    #[error("provider {0} is already registered")]
    DuplicateProvider(ProviderId),

    /// The executor could not be built.
    #[error("executor error: {0}")]
    Executor(String),
}

impl CoordinatorError {
    /// Returns the search error if this is one.
    pub fn as_search(&self) -> Option<&SearchError> {
        match self {
            Self::Search { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the provider that caused the error, if any.
    pub fn provider(&self) -> Option<&ProviderId> {
        match self {
            Self::Provider { provider, .. } | Self::Search { provider, .. } => Some(provider),
            Self::DuplicateProvider(provider) => Some(provider),
            _ => None,
        }
    }
}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;
