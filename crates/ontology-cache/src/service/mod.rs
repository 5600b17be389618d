//! The ontology service facade.
//!
//! [`OntologyService`] is what applications talk to. It resolves terms by URI
//! with a race, searches and batch-resolves with fan-outs, and answers
//! hierarchy questions through the [`SubsetReuseCache`].
//!
//! # Example
//!
//! ```ignore
//! use ontology_cache::OntologyService;
//! use ontology_coordinator::{ProviderRegistry, TermSet};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ProviderRegistry::with_providers([uberon, cell_ontology])?);
//! let service = OntologyService::new(registry)?;
//!
//! // Race: first provider with a labelled term wins
//! let brain = service.get_term("http://purl.obolibrary.org/obo/UBERON_0000955")?;
//!
//! // Search: ranked by score, deduplicated by URI
//! let hits = service.find_terms("brain", 20)?;
//!
//! // Hierarchy: cached, with subset reuse
//! let ancestors = service.get_parents(&TermSet::new(brain), false, true)?;
//!
//! // Background maintenance
//! service.reindex_all();
//! ```

mod types;

pub use types::ServiceStats;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use ontology_coordinator::{
    submit, CancellationToken, Coordinator, OntologyProvider, ProviderError, ProviderId,
    ProviderRegistry, ProviderResult, Relation, Resource, SearchHit, SharedProvider, TaskHandle,
    Term, TermSet,
};
use tracing::{debug, error, info};

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::key::SearchKey;
use crate::store::SingleFlightCache;
use crate::subset::SubsetReuseCache;

/// Cached per-provider search results.
type SearchCache<T> = SingleFlightCache<SearchKey, Arc<[SearchHit<T>]>, ProviderError>;

/// Resolves ontology terms across every registered provider.
///
/// All calls block the calling thread. Providers that are disabled or still
/// loading are ignored. Hierarchy and search results are cached; call
/// [`invalidate`](Self::invalidate) (or let [`reinitialize`](Self::reinitialize)
/// do it) when a provider's content changes.
pub struct OntologyService {
    coordinator: Arc<Coordinator>,
    hierarchy: Arc<SubsetReuseCache>,
    term_search: Arc<SearchCache<Term>>,
    resource_search: Arc<SearchCache<Resource>>,
    config: ServiceConfig,
}

impl OntologyService {
    /// Creates a service with default configuration.
    pub fn new(registry: Arc<ProviderRegistry>) -> ServiceResult<Self> {
        Self::with_config(registry, ServiceConfig::default())
    }

    /// Creates a service with custom configuration.
    pub fn with_config(registry: Arc<ProviderRegistry>, config: ServiceConfig) -> ServiceResult<Self> {
        let coordinator = Coordinator::with_config(registry, config.coordinator.clone())?;
        Ok(Self::with_coordinator(Arc::new(coordinator), config))
    }

    /// Creates a service on top of an existing coordinator.
    ///
    /// `config.coordinator` is ignored; the coordinator keeps its own settings.
    pub fn with_coordinator(coordinator: Arc<Coordinator>, config: ServiceConfig) -> Self {
        let hierarchy = SubsetReuseCache::new(
            Arc::clone(&coordinator),
            config.hierarchy_cache.clone(),
            config.subset_reuse,
        );
        Self {
            hierarchy: Arc::new(hierarchy),
            term_search: Arc::new(SingleFlightCache::new(config.search_cache.clone())),
            resource_search: Arc::new(SingleFlightCache::new(config.search_cache.clone())),
            coordinator,
            config,
        }
    }

    // =========================================================================
    // Lookup by URI
    // =========================================================================

    /// Returns the first labelled term any provider has for `uri`.
    ///
    /// A provider answering with an unlabelled term is treated as not knowing
    /// the URI, so the race continues with the others.
    pub fn get_term(&self, uri: &str) -> ServiceResult<Option<Term>> {
        let owned = uri.to_string();
        let term = self.coordinator.find_first(uri, move |provider, token| {
            Ok(provider.get_term(&owned, token)?.filter(Term::has_label))
        })?;
        Ok(term)
    }

    /// Returns the first resource any provider has for `uri`.
    pub fn get_resource(&self, uri: &str) -> ServiceResult<Option<Resource>> {
        let owned = uri.to_string();
        let resource = self
            .coordinator
            .find_first(uri, move |provider, token| provider.get_resource(&owned, token))?;
        Ok(resource)
    }

    /// Looks up many URIs at once across every provider.
    ///
    /// Unlabelled terms are dropped. When several providers know a URI, one
    /// of their terms is kept.
    pub fn get_terms<I, S>(&self, uris: I) -> ServiceResult<TermSet>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let uris: BTreeSet<String> = uris.into_iter().map(Into::into).collect();
        if uris.is_empty() {
            return Ok(TermSet::empty());
        }
        let description = format!("terms for {} URIs", uris.len());
        let found = self.coordinator.combine(&description, move |provider, token| {
            let mut terms = Vec::new();
            for uri in &uris {
                if let Some(term) = provider.get_term(uri, token)? {
                    terms.push(term);
                }
            }
            terms.retain(Term::has_label);
            Ok(terms)
        })?;
        Ok(found.into_iter().collect())
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Searches terms by free text.
    ///
    /// A blank query returns nothing. A query that looks like a URI is first
    /// resolved with [`get_term`](Self::get_term). Otherwise every
    /// search-enabled provider is queried (through the search cache), and the
    /// hits are ranked by descending score, deduplicated by URI and truncated
    /// to `max_results`.
    pub fn find_terms(&self, query: &str, max_results: usize) -> ServiceResult<Vec<Term>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if looks_like_uri(query) {
            if let Some(term) = self.get_term(query)? {
                return Ok(vec![term]);
            }
        }
        let hits = self.search_cached(&self.term_search, query, max_results, |p, q, max, token| {
            p.find_terms(q, max, token)
        })?;
        Ok(rank(hits, max_results, Term::uri))
    }

    /// Searches resources by free text. Same rules as
    /// [`find_terms`](Self::find_terms).
    pub fn find_resources(&self, query: &str, max_results: usize) -> ServiceResult<Vec<Resource>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if looks_like_uri(query) {
            if let Some(resource) = self.get_resource(query)? {
                return Ok(vec![resource]);
            }
        }
        let hits = self.search_cached(
            &self.resource_search,
            query,
            max_results,
            |p, q, max, token| p.find_resources(q, max, token),
        )?;
        Ok(rank(hits, max_results, Resource::uri))
    }

    fn search_cached<T, S>(
        &self,
        cache: &Arc<SearchCache<T>>,
        query: &str,
        max_results: usize,
        search: S,
    ) -> ServiceResult<Vec<SearchHit<T>>>
    where
        T: Clone + Send + Sync + 'static,
        S: Fn(&dyn OntologyProvider, &str, usize, &CancellationToken) -> ProviderResult<Vec<SearchHit<T>>>
            + Send
            + Sync
            + 'static,
    {
        let cache = Arc::clone(cache);
        let owned = query.to_string();
        let hits = self.coordinator.search(query, move |provider, token| {
            let key = SearchKey::new(provider.id().clone(), owned.as_str(), max_results);
            loop {
                let mut led = false;
                let outcome = cache.get_or_try_insert_with(&key, || {
                    led = true;
                    search(provider, &owned, max_results, token).map(Arc::<[SearchHit<T>]>::from)
                });
                match outcome {
                    // Another caller's search was cancelled, not ours: run it again.
                    Err(ProviderError::Cancelled) if !led && !token.is_cancelled() => continue,
                    outcome => return outcome.map(|hits| hits.to_vec()),
                }
            }
        })?;
        Ok(hits)
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Returns the parents of `terms`.
    ///
    /// See [`related`](Self::related).
    pub fn get_parents(
        &self,
        terms: &TermSet,
        direct: bool,
        include_additional_properties: bool,
    ) -> ServiceResult<TermSet> {
        self.related(Relation::Parents, terms, direct, include_additional_properties)
    }

    /// Returns the children of `terms`.
    ///
    /// See [`related`](Self::related).
    pub fn get_children(
        &self,
        terms: &TermSet,
        direct: bool,
        include_additional_properties: bool,
    ) -> ServiceResult<TermSet> {
        self.related(Relation::Children, terms, direct, include_additional_properties)
    }

    /// Returns the parents or children of `terms` according to every
    /// available provider.
    ///
    /// For non-direct queries, terms found by one provider are asked about
    /// again until no new terms appear, so ancestry that crosses ontologies is
    /// followed. Unlabelled results are replaced by a labelled version from
    /// any provider when one exists and dropped otherwise.
    pub fn related(
        &self,
        relation: Relation,
        terms: &TermSet,
        direct: bool,
        include_additional_properties: bool,
    ) -> ServiceResult<TermSet> {
        if terms.is_empty() {
            return Ok(TermSet::empty());
        }
        let start = Instant::now();
        let providers = self.coordinator.registry().available();

        let mut results =
            self.hierarchy
                .resolve(&providers, terms, direct, include_additional_properties, relation)?;

        if !direct {
            let mut queried = terms.clone();
            let mut to_query = results.difference(&queried);
            while !to_query.is_empty() {
                debug!(
                    "Found {} new {} terms, will requery them",
                    to_query.len(),
                    relation
                );
                let more = self.hierarchy.resolve(
                    &providers,
                    &to_query,
                    direct,
                    include_additional_properties,
                    relation,
                )?;
                queried = queried.union(&to_query);
                results = results.union(&more);
                to_query = more.difference(&queried);
            }
        }

        let unlabelled: Vec<&str> = results
            .iter()
            .filter(|t| !t.has_label())
            .map(Term::uri)
            .collect();
        if !unlabelled.is_empty() {
            let replacements = self.get_terms(unlabelled)?;
            results = replacements.union(&results);
        }

        let labelled: TermSet = results.iter().filter(|t| t.has_label()).cloned().collect();
        debug!(
            "{} {} of {} terms: {} found in {} ms",
            if direct { "Direct" } else { "All" },
            relation,
            terms.len(),
            labelled.len(),
            start.elapsed().as_millis()
        );
        Ok(labelled)
    }

    // =========================================================================
    // Cache maintenance
    // =========================================================================

    /// Evicts every cached hierarchy and search result that involves
    /// `provider`. Returns the number of entries removed.
    pub fn invalidate(&self, provider: &ProviderId) -> usize {
        self.hierarchy.invalidate(provider)
            + evict_searches(&self.term_search, &self.resource_search, provider)
    }

    /// Clears every cache.
    pub fn clear_caches(&self) {
        self.hierarchy.clear();
        self.term_search.clear();
        self.resource_search.clear();
    }

    /// Rebuilds one provider's search index in the background, then evicts
    /// its cached searches.
    pub fn reindex(&self, provider: &ProviderId) -> ServiceResult<TaskHandle> {
        let provider = self.provider(provider)?;
        Ok(self.spawn_reindex(provider))
    }

    /// Rebuilds the search index of every enabled, search-enabled provider.
    pub fn reindex_all(&self) -> Vec<TaskHandle> {
        self.registry()
            .all()
            .into_iter()
            .filter(|p| p.is_enabled() && p.is_search_enabled())
            .map(|p| self.spawn_reindex(p))
            .collect()
    }

    /// Reloads one provider in the background, then evicts its cached
    /// hierarchy results, and its cached searches if search is enabled.
    pub fn reinitialize(&self, provider: &ProviderId) -> ServiceResult<TaskHandle> {
        let provider = self.provider(provider)?;
        Ok(self.spawn_reinitialize(provider))
    }

    /// Reloads every enabled provider whose ontology is loaded.
    pub fn reinitialize_all(&self) -> Vec<TaskHandle> {
        self.registry()
            .all()
            .into_iter()
            .filter(|p| p.is_enabled() && p.is_ontology_loaded())
            .map(|p| self.spawn_reinitialize(p))
            .collect()
    }

    fn spawn_reindex(&self, provider: SharedProvider) -> TaskHandle {
        let term_search = Arc::clone(&self.term_search);
        let resource_search = Arc::clone(&self.resource_search);
        submit(self.coordinator.executor().as_ref(), move |_| {
            info!("Reindexing {}...", provider.id());
            match provider.index(true) {
                Ok(()) => {
                    let evicted = evict_searches(&term_search, &resource_search, provider.id());
                    info!(
                        "Reindexed {}, evicted {} cached searches",
                        provider.id(),
                        evicted
                    );
                }
                Err(err) => error!("Reindexing {} failed: {}", provider.id(), err),
            }
        })
    }

    fn spawn_reinitialize(&self, provider: SharedProvider) -> TaskHandle {
        let hierarchy = Arc::clone(&self.hierarchy);
        let term_search = Arc::clone(&self.term_search);
        let resource_search = Arc::clone(&self.resource_search);
        let with_search = provider.is_search_enabled();
        submit(self.coordinator.executor().as_ref(), move |_| {
            info!("Reinitializing {}...", provider.id());
            match provider.initialize(true, with_search) {
                Ok(()) => {
                    let mut evicted = hierarchy.invalidate(provider.id());
                    if with_search {
                        evicted += evict_searches(&term_search, &resource_search, provider.id());
                    }
                    info!(
                        "Reinitialized {}, evicted {} cached results",
                        provider.id(),
                        evicted
                    );
                }
                Err(err) => error!("Reinitializing {} failed: {}", provider.id(), err),
            }
        })
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Adds a provider. Fails if its id is already registered.
    pub fn register_provider(&self, provider: SharedProvider) -> ServiceResult<()> {
        self.registry().register(provider)?;
        Ok(())
    }

    /// Removes a provider and evicts everything cached about it.
    pub fn deregister_provider(&self, provider: &ProviderId) -> Option<SharedProvider> {
        let removed = self.registry().deregister(provider)?;
        self.invalidate(provider);
        Some(removed)
    }

    /// Returns the provider registry.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.coordinator.registry()
    }

    /// Returns the coordinator.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns service statistics.
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            hierarchy: self.hierarchy.stats(),
            term_search: self.term_search.stats(),
            resource_search: self.resource_search.stats(),
            providers: self.registry().len(),
            available_providers: self.registry().available().len(),
        }
    }

    fn provider(&self, id: &ProviderId) -> ServiceResult<SharedProvider> {
        self.registry()
            .get(id)
            .ok_or_else(|| ServiceError::UnknownProvider(id.clone()))
    }
}

impl std::fmt::Debug for OntologyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OntologyService")
            .field("coordinator", &self.coordinator)
            .field("hierarchy", &self.hierarchy)
            .field("config", &self.config)
            .finish()
    }
}

fn looks_like_uri(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}

fn evict_searches(
    term_search: &SearchCache<Term>,
    resource_search: &SearchCache<Resource>,
    provider: &ProviderId,
) -> usize {
    term_search.evict_if(|key| key.provider() == provider)
        + resource_search.evict_if(|key| key.provider() == provider)
}

/// Orders hits by descending score and keeps the best hit per URI.
fn rank<T, F>(mut hits: Vec<SearchHit<T>>, max_results: usize, uri: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(uri(&hit.item).to_string()))
        .map(|hit| hit.item)
        .take(max_results)
        .collect()
}
