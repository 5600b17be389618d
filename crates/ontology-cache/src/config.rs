//! Configuration types for caching and the ontology service.

use std::time::Duration;

use ontology_coordinator::CoordinatorConfig;

/// Configuration for a single-flight cache.
///
/// # Example
///
/// ```rust
/// use ontology_cache::CacheConfig;
/// use std::time::Duration;
///
/// let cache = CacheConfig {
///     max_entries: 50_000,
///     ttl: Some(Duration::from_secs(3600)),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached results.
    pub max_entries: usize,
    /// Time-to-live for cached entries (None = kept until evicted).
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: None,
        }
    }
}

/// How far the subset-reuse search looks for a cached subset.
///
/// For a query of `n` terms, subsets obtained by dropping up to
/// [`max_drop_for(n)`](Self::max_drop_for) terms are probed. Probing costs
/// `C(n, k)` lookups for each `k`, so large queries only drop one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsetReuseConfig {
    /// Terms that may be dropped from queries smaller than the threshold.
    pub max_drop_small: usize,
    /// Terms that may be dropped from queries at or above the threshold.
    pub max_drop_large: usize,
    /// Query size from which `max_drop_large` applies.
    pub large_set_threshold: usize,
}

impl Default for SubsetReuseConfig {
    fn default() -> Self {
        Self {
            max_drop_small: 2,
            max_drop_large: 1,
            large_set_threshold: 100,
        }
    }
}

impl SubsetReuseConfig {
    /// Disables subset reuse: only exact hits are served from the cache.
    pub fn disabled() -> Self {
        Self {
            max_drop_small: 0,
            max_drop_large: 0,
            large_set_threshold: 0,
        }
    }

    /// Maximum number of terms dropped when probing a query of `n` terms.
    pub fn max_drop_for(&self, n: usize) -> usize {
        let ceiling = if n < self.large_set_threshold {
            self.max_drop_small
        } else {
            self.max_drop_large
        };
        ceiling.min(n.saturating_sub(1))
    }
}

/// Configuration for the [`OntologyService`](crate::OntologyService).
///
/// # Example
///
/// ```rust
/// use ontology_cache::{CacheConfig, ServiceConfig, SubsetReuseConfig};
/// use ontology_coordinator::CoordinatorConfig;
/// use std::time::Duration;
///
/// let config = ServiceConfig::builder()
///     .with_coordinator(
///         CoordinatorConfig::builder()
///             .with_timeout(Duration::from_secs(30))
///             .build(),
///     )
///     .with_hierarchy_cache(CacheConfig { max_entries: 100_000, ttl: None })
///     .with_subset_reuse(SubsetReuseConfig::default())
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Coordination settings (timeouts, slow-query logging, worker threads).
    pub coordinator: CoordinatorConfig,
    /// Cache for parent and child lookups.
    pub hierarchy_cache: CacheConfig,
    /// Cache for per-provider search results.
    pub search_cache: CacheConfig,
    /// Subset-reuse probing limits.
    pub subset_reuse: SubsetReuseConfig,
}

impl ServiceConfig {
    /// Creates a new builder for ServiceConfig.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

/// Builder for ServiceConfig.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Sets the coordinator configuration.
    pub fn with_coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.config.coordinator = coordinator;
        self
    }

    /// Sets the parent/child cache configuration.
    pub fn with_hierarchy_cache(mut self, cache: CacheConfig) -> Self {
        self.config.hierarchy_cache = cache;
        self
    }

    /// Sets the search cache configuration.
    pub fn with_search_cache(mut self, cache: CacheConfig) -> Self {
        self.config.search_cache = cache;
        self
    }

    /// Sets the subset-reuse limits.
    pub fn with_subset_reuse(mut self, subset_reuse: SubsetReuseConfig) -> Self {
        self.config.subset_reuse = subset_reuse;
        self
    }

    /// Sets the number of worker threads.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.config.coordinator.worker_threads = threads.max(1);
        self
    }

    /// Builds the ServiceConfig.
    pub fn build(self) -> ServiceConfig {
        self.config
    }
}
