//! Parent and child lookups cached with subset reuse.
//!
//! Hierarchy queries are expensive, and callers often ask about a set of terms
//! that differs from an earlier query by one or two terms. When an exact key
//! misses, [`SubsetReuseCache`] looks for a cached result of the same query
//! with a few terms dropped, and asks the providers only about the dropped
//! terms:
//!
//! ```text
//! resolve({x, y, z})   cached: {x, y} -> R
//!   probe {y, z}, {x, z}, {x, y}   hit on {x, y}
//!   fan-out for {z}                R' = raw({z})
//!   result R ∪ R', cached under {x, y, z}
//! ```
//!
//! The union of per-term answers equals the answer for the whole set, so the
//! reuse is invisible to callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ontology_coordinator::{
    CancellationToken, Coordinator, CoordinatorError, CoordinatorResult, OntologyProvider,
    ProviderId, ProviderRegistry, Relation, SharedProvider, TermSet,
};
use tracing::debug;

use crate::combinations::{binomial, Combinations};
use crate::config::{CacheConfig, SubsetReuseConfig};
use crate::key::QueryKey;
use crate::store::{CacheStats, SingleFlightCache};

/// Cache of parent/child lookups that reuses results for subsets of a query.
///
/// # Example
///
/// ```ignore
/// let cache = SubsetReuseCache::new(coordinator, CacheConfig::default(), SubsetReuseConfig::default());
/// let providers = coordinator.registry().available();
///
/// let parents = cache.resolve(&providers, &terms, true, false, Relation::Parents)?;
/// ```
pub struct SubsetReuseCache {
    coordinator: Arc<Coordinator>,
    cache: SingleFlightCache<QueryKey, TermSet, CoordinatorError>,
    config: SubsetReuseConfig,
    subset_hits: AtomicU64,
    fan_outs: AtomicU64,
}

impl SubsetReuseCache {
    /// Creates an empty cache.
    pub fn new(
        coordinator: Arc<Coordinator>,
        cache: CacheConfig,
        config: SubsetReuseConfig,
    ) -> Self {
        Self {
            coordinator,
            cache: SingleFlightCache::new(cache),
            config,
            subset_hits: AtomicU64::new(0),
            fan_outs: AtomicU64::new(0),
        }
    }

    /// Returns the parents or children of `terms` according to `providers`.
    ///
    /// An empty term set yields an empty result without touching the cache.
    /// Concurrent calls with the same key compute once. A failing provider
    /// fails the call and nothing is cached.
    ///
    /// Unavailable providers in `providers` are left out of the key. If one of
    /// the remaining providers becomes unavailable before the answer is in,
    /// the answer is returned but not cached.
    pub fn resolve(
        &self,
        providers: &[SharedProvider],
        terms: &TermSet,
        direct: bool,
        include_additional_properties: bool,
        relation: Relation,
    ) -> CoordinatorResult<TermSet> {
        if terms.is_empty() {
            return Ok(TermSet::empty());
        }
        let providers: Vec<SharedProvider> = providers
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect();
        let key = QueryKey::new(
            ProviderRegistry::group_of(&providers),
            terms.clone(),
            direct,
            include_additional_properties,
            relation,
        );
        self.cache.get_or_try_compute(&key, || {
            let result = self.compute(&providers, &key)?;
            let complete = providers.iter().all(|p| p.is_available());
            if !complete {
                debug!("A provider went away while computing {}, not caching", key);
            }
            Ok((result, complete))
        })
    }

    /// Evicts every entry whose provider group includes `provider`.
    pub fn invalidate(&self, provider: &ProviderId) -> usize {
        let evicted = self.cache.evict_if(|key| key.references(provider));
        debug!("Evicted {} hierarchy entries for {}", evicted, provider);
        evicted
    }

    /// Clears the cache.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Returns true if `key` has a fresh entry.
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.cache.contains(key)
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns the subset-reuse limits.
    pub fn config(&self) -> &SubsetReuseConfig {
        &self.config
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> SubsetReuseStats {
        SubsetReuseStats {
            cache: self.cache.stats(),
            subset_hits: self.subset_hits.load(Ordering::Relaxed),
            fan_outs: self.fan_outs.load(Ordering::Relaxed),
        }
    }

    fn compute(&self, providers: &[SharedProvider], key: &QueryKey) -> CoordinatorResult<TermSet> {
        if key.terms().len() > 1 {
            if let Some(result) = self.reuse_subset(providers, key)? {
                return Ok(result);
            }
        }
        self.fan_out(providers, key)
    }

    fn reuse_subset(
        &self,
        providers: &[SharedProvider],
        key: &QueryKey,
    ) -> CoordinatorResult<Option<TermSet>> {
        let terms = key.terms();
        let n = terms.len();
        let max_drop = self.config.max_drop_for(n);

        for k in 1..=max_drop {
            debug!("Probing {} subsets of {} terms with {} dropped", binomial(n, k), n, k);
            for dropped in Combinations::new(n, k) {
                let kept = key.with_terms(terms.without(&dropped));
                let Some(cached) = self.cache.get(&kept) else {
                    continue;
                };
                let remainder = key.with_terms(terms.select(&dropped));
                debug!(
                    "Reusing cached {} for {} of {} terms, querying {}",
                    key.relation(),
                    n - k,
                    n,
                    remainder.terms()
                );
                self.subset_hits.fetch_add(1, Ordering::Relaxed);
                let fresh = self.fan_out(providers, &remainder)?;
                return Ok(Some(cached.union(&fresh)));
            }
        }
        Ok(None)
    }

    fn fan_out(&self, providers: &[SharedProvider], key: &QueryKey) -> CoordinatorResult<TermSet> {
        self.fan_outs.fetch_add(1, Ordering::Relaxed);
        let terms = key.terms().clone();
        let (direct, include_additional_properties, relation) =
            (key.direct(), key.include_additional_properties(), key.relation());
        let found = self.coordinator.combine_over(
            providers,
            &key.to_string(),
            move |provider, token| {
                provider.related(relation, &terms, direct, include_additional_properties, token)
            },
            &CancellationToken::new(),
        )?;
        Ok(found.into_iter().collect())
    }
}

impl std::fmt::Debug for SubsetReuseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsetReuseCache")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

/// Statistics about a [`SubsetReuseCache`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubsetReuseStats {
    /// Underlying cache counters.
    pub cache: CacheStats,
    /// Misses answered by extending a cached subset.
    pub subset_hits: u64,
    /// Provider fan-outs issued, full or partial.
    pub fan_outs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontology_coordinator::{
        CoordinatorConfig, OntologyProvider, ProviderResult, SearchHit, Term, ThreadExecutor,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Provider recording the term sets it is asked about.
    struct RecordingProvider {
        id: ProviderId,
        parents: HashMap<String, Vec<String>>,
        queries: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingProvider {
        fn new(id: &str, edges: &[(&str, &str)]) -> Self {
            let mut parents: HashMap<String, Vec<String>> = HashMap::new();
            for (child, parent) in edges {
                parents
                    .entry(child.to_string())
                    .or_default()
                    .push(parent.to_string());
            }
            Self {
                id: ProviderId::new(id),
                parents,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<Vec<String>> {
            self.queries.lock().clone()
        }
    }

    impl OntologyProvider for RecordingProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn is_ontology_loaded(&self) -> bool {
            true
        }

        fn get_term(&self, _uri: &str, _cancel: &CancellationToken) -> ProviderResult<Option<Term>> {
            Ok(None)
        }

        fn find_terms(
            &self,
            _query: &str,
            _max_results: usize,
            _cancel: &CancellationToken,
        ) -> ProviderResult<Vec<SearchHit<Term>>> {
            Ok(Vec::new())
        }

        fn get_parents(
            &self,
            terms: &TermSet,
            _direct: bool,
            _include_additional_properties: bool,
            _cancel: &CancellationToken,
        ) -> ProviderResult<Vec<Term>> {
            self.queries
                .lock()
                .push(terms.iter().map(|t| t.uri().to_string()).collect());
            Ok(terms
                .iter()
                .filter_map(|t| self.parents.get(t.uri()))
                .flatten()
                .map(|uri| Term::new(uri.as_str()))
                .collect())
        }

        fn get_children(
            &self,
            _terms: &TermSet,
            _direct: bool,
            _include_additional_properties: bool,
            _cancel: &CancellationToken,
        ) -> ProviderResult<Vec<Term>> {
            Ok(Vec::new())
        }
    }

    fn setup(edges: &[(&str, &str)]) -> (SubsetReuseCache, Arc<RecordingProvider>, Vec<SharedProvider>) {
        let provider = Arc::new(RecordingProvider::new("uberon", edges));
        let registry = Arc::new(
            ProviderRegistry::with_providers([Arc::clone(&provider) as SharedProvider]).unwrap(),
        );
        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&registry),
            Arc::new(ThreadExecutor::new()),
            CoordinatorConfig::default(),
        ));
        let cache = SubsetReuseCache::new(
            coordinator,
            CacheConfig::default(),
            SubsetReuseConfig::default(),
        );
        (cache, provider, registry.available())
    }

    fn terms(uris: &[&str]) -> TermSet {
        uris.iter().map(|uri| Term::new(*uri)).collect()
    }

    #[test]
    fn test_empty_input() {
        let (cache, provider, providers) = setup(&[]);
        let result = cache
            .resolve(&providers, &TermSet::empty(), true, false, Relation::Parents)
            .unwrap();
        assert!(result.is_empty());
        assert!(provider.queries().is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_singleton_fans_out_once() {
        let (cache, provider, providers) = setup(&[("x", "px")]);
        let query = terms(&["x"]);

        let first = cache.resolve(&providers, &query, true, false, Relation::Parents).unwrap();
        let second = cache.resolve(&providers, &query, true, false, Relation::Parents).unwrap();

        assert_eq!(first, terms(&["px"]));
        assert_eq!(first, second);
        assert_eq!(provider.queries().len(), 1);
    }

    #[test]
    fn test_subset_reuse_queries_remainder_only() {
        let (cache, provider, providers) = setup(&[("x", "px"), ("y", "py"), ("z", "pz")]);

        cache
            .resolve(&providers, &terms(&["x", "y"]), true, false, Relation::Parents)
            .unwrap();
        let result = cache
            .resolve(&providers, &terms(&["x", "y", "z"]), true, false, Relation::Parents)
            .unwrap();

        assert_eq!(result, terms(&["px", "py", "pz"]));
        assert_eq!(
            provider.queries(),
            vec![
                vec!["x".to_string(), "y".to_string()],
                vec!["z".to_string()]
            ]
        );
        assert_eq!(cache.stats().subset_hits, 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_subset_reuse_two_dropped() {
        let (cache, provider, providers) = setup(&[("a", "pa"), ("d", "pd"), ("e", "pe")]);

        cache
            .resolve(&providers, &terms(&["a", "b", "c"]), true, false, Relation::Parents)
            .unwrap();
        let result = cache
            .resolve(&providers, &terms(&["a", "b", "c", "d", "e"]), true, false, Relation::Parents)
            .unwrap();

        assert_eq!(result, terms(&["pa", "pd", "pe"]));
        assert_eq!(
            provider.queries().last().cloned(),
            Some(vec!["d".to_string(), "e".to_string()])
        );
    }

    #[test]
    fn test_no_reuse_beyond_drop_ceiling() {
        let (cache, provider, providers) = setup(&[]);

        cache
            .resolve(&providers, &terms(&["a"]), true, false, Relation::Parents)
            .unwrap();
        cache
            .resolve(&providers, &terms(&["a", "b", "c", "d"]), true, false, Relation::Parents)
            .unwrap();

        assert_eq!(provider.queries().last().map(Vec::len), Some(4));
        assert_eq!(cache.stats().subset_hits, 0);
    }

    #[test]
    fn test_flags_partition_the_cache() {
        let (cache, provider, providers) = setup(&[("x", "px")]);
        let query = terms(&["x"]);

        cache.resolve(&providers, &query, true, false, Relation::Parents).unwrap();
        cache.resolve(&providers, &query, false, false, Relation::Parents).unwrap();
        cache.resolve(&providers, &query, true, true, Relation::Parents).unwrap();

        assert_eq!(provider.queries().len(), 3);
    }

    #[test]
    fn test_invalidate() {
        let (cache, provider, providers) = setup(&[("x", "px")]);
        let query = terms(&["x"]);

        cache.resolve(&providers, &query, true, false, Relation::Parents).unwrap();
        assert_eq!(cache.invalidate(&ProviderId::new("cl")), 0);
        assert_eq!(cache.invalidate(&ProviderId::new("uberon")), 1);
        cache.resolve(&providers, &query, true, false, Relation::Parents).unwrap();

        assert_eq!(provider.queries().len(), 2);
    }
}
