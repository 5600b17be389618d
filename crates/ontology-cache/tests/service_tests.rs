//! Integration tests for the ontology service facade.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ontology_cache::{OntologyService, ServiceConfig, ServiceError};
use ontology_coordinator::{
    CancellationToken, Coordinator, CoordinatorConfig, CoordinatorError, OntologyProvider,
    ProviderId, ProviderRegistry, ProviderResult, Resource, ResourceKind, SearchError, SearchHit,
    SharedProvider, Term, TermSet, ThreadExecutor,
};

/// In-memory ontology with switchable availability and call counters.
struct TestOntology {
    id: ProviderId,
    enabled: bool,
    search_enabled: bool,
    loaded: AtomicBool,
    delay: Duration,
    labels: HashMap<String, Option<String>>,
    parents: HashMap<String, Vec<String>>,
    children: HashMap<String, Vec<String>>,
    scores: HashMap<String, f64>,
    reject_search: bool,
    stall_next_search: AtomicBool,
    searches: AtomicUsize,
    hierarchy_queries: AtomicUsize,
    lookups: AtomicUsize,
    reindexed: AtomicUsize,
    reinitialized: AtomicUsize,
}

impl TestOntology {
    fn new(id: &str) -> Self {
        Self {
            id: ProviderId::new(id),
            enabled: true,
            search_enabled: true,
            loaded: AtomicBool::new(true),
            delay: Duration::ZERO,
            labels: HashMap::new(),
            parents: HashMap::new(),
            children: HashMap::new(),
            scores: HashMap::new(),
            reject_search: false,
            stall_next_search: AtomicBool::new(false),
            searches: AtomicUsize::new(0),
            hierarchy_queries: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            reindexed: AtomicUsize::new(0),
            reinitialized: AtomicUsize::new(0),
        }
    }

    fn term(mut self, uri: &str, label: &str) -> Self {
        self.labels.insert(uri.to_string(), Some(label.to_string()));
        self
    }

    fn unlabelled(mut self, uri: &str) -> Self {
        self.labels.insert(uri.to_string(), None);
        self
    }

    fn scored(mut self, uri: &str, label: &str, score: f64) -> Self {
        self.scores.insert(uri.to_string(), score);
        self.term(uri, label)
    }

    fn is_a(mut self, child: &str, parent: &str) -> Self {
        self.parents
            .entry(child.to_string())
            .or_default()
            .push(parent.to_string());
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn without_search(mut self) -> Self {
        self.search_enabled = false;
        self
    }

    fn rejecting_search(mut self) -> Self {
        self.reject_search = true;
        self
    }

    /// The next search blocks until its token is cancelled.
    fn stalling_next_search(self) -> Self {
        self.stall_next_search.store(true, Ordering::SeqCst);
        self
    }

    fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn make_term(&self, uri: &str) -> Term {
        match self.labels.get(uri) {
            Some(Some(label)) => Term::new(uri).with_label(label.as_str()),
            _ => Term::new(uri),
        }
    }

    fn walk(&self, edges: &HashMap<String, Vec<String>>, uri: &str, direct: bool, out: &mut Vec<Term>) {
        for next in edges.get(uri).into_iter().flatten() {
            out.push(self.make_term(next));
            if !direct {
                self.walk(edges, next, direct, out);
            }
        }
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl OntologyProvider for TestOntology {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_ontology_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn is_search_enabled(&self) -> bool {
        self.search_enabled && self.is_ontology_loaded()
    }

    fn get_term(&self, uri: &str, cancel: &CancellationToken) -> ProviderResult<Option<Term>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        cancel.check()?;
        Ok(self.labels.contains_key(uri).then(|| self.make_term(uri)))
    }

    fn get_resource(&self, uri: &str, cancel: &CancellationToken) -> ProviderResult<Option<Resource>> {
        Ok(self
            .get_term(uri, cancel)?
            .map(|t| Resource::new(t.uri(), ResourceKind::Individual)))
    }

    fn find_terms(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<SearchHit<Term>>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.stall_next_search.swap(false, Ordering::SeqCst) {
            loop {
                cancel.check()?;
                thread::sleep(Duration::from_millis(1));
            }
        }
        if self.reject_search {
            return Err(SearchError::MalformedQuery {
                query: query.to_string(),
                message: "unexpected token".to_string(),
            }
            .into());
        }
        Ok(self
            .labels
            .iter()
            .filter(|(_, label)| label.as_deref().is_some_and(|l| l.contains(query)))
            .map(|(uri, _)| {
                SearchHit::new(self.make_term(uri), self.scores.get(uri).copied().unwrap_or(0.5))
            })
            .take(max_results)
            .collect())
    }

    fn get_parents(
        &self,
        terms: &TermSet,
        direct: bool,
        _include_additional_properties: bool,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Term>> {
        self.hierarchy_queries.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::new();
        for term in terms {
            self.walk(&self.parents, term.uri(), direct, &mut out);
        }
        Ok(out)
    }

    fn get_children(
        &self,
        terms: &TermSet,
        direct: bool,
        _include_additional_properties: bool,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Term>> {
        self.hierarchy_queries.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::new();
        for term in terms {
            self.walk(&self.children, term.uri(), direct, &mut out);
        }
        Ok(out)
    }

    fn index(&self, _force: bool) -> ProviderResult<()> {
        self.reindexed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn initialize(&self, _force: bool, _with_search: bool) -> ProviderResult<()> {
        self.reinitialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn service_with(ontologies: Vec<Arc<TestOntology>>) -> OntologyService {
    service_with_config(ontologies, CoordinatorConfig::default())
}

fn service_with_config(
    ontologies: Vec<Arc<TestOntology>>,
    config: CoordinatorConfig,
) -> OntologyService {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let registry = Arc::new(
        ProviderRegistry::with_providers(ontologies.into_iter().map(|o| o as SharedProvider))
            .unwrap(),
    );
    let coordinator = Coordinator::new(
        registry,
        Arc::new(ThreadExecutor::new()),
        config,
    );
    OntologyService::with_coordinator(Arc::new(coordinator), ServiceConfig::default())
}

fn terms(uris: &[&str]) -> TermSet {
    uris.iter().map(|uri| Term::new(*uri)).collect()
}

fn uris(set: &TermSet) -> Vec<&str> {
    set.iter().map(Term::uri).collect()
}

// =============================================================================
// Lookup by URI
// =============================================================================

#[test]
fn test_get_term_skips_unlabelled_answers() {
    let fast = Arc::new(TestOntology::new("fast").unlabelled("obo:x"));
    let slow = Arc::new(
        TestOntology::new("slow")
            .term("obo:x", "brain")
            .with_delay(Duration::from_millis(50)),
    );
    let service = service_with(vec![fast, slow]);

    let term = service.get_term("obo:x").unwrap().unwrap();
    assert_eq!(term.label(), Some("brain"));
}

#[test]
fn test_get_term_unknown_or_unlabelled_is_none() {
    let service = service_with(vec![Arc::new(TestOntology::new("a").unlabelled("obo:x"))]);
    assert!(service.get_term("obo:x").unwrap().is_none());
    assert!(service.get_term("obo:y").unwrap().is_none());
}

#[test]
fn test_get_resource() {
    let service = service_with(vec![Arc::new(TestOntology::new("a").term("obo:x", "x"))]);
    let resource = service.get_resource("obo:x").unwrap().unwrap();
    assert_eq!(resource.kind(), ResourceKind::Individual);
    assert!(service.get_resource("obo:none").unwrap().is_none());
}

#[test]
fn test_get_terms_merges_providers_and_drops_unlabelled() {
    let a = Arc::new(TestOntology::new("a").term("obo:x", "x").unlabelled("obo:y"));
    let b = Arc::new(TestOntology::new("b").term("obo:y", "y").unlabelled("obo:z"));
    let service = service_with(vec![a, b]);

    let found = service
        .get_terms(["obo:x", "obo:y", "obo:z", "obo:x"])
        .unwrap();
    assert_eq!(uris(&found), vec!["obo:x", "obo:y"]);
    assert!(found.iter().all(Term::has_label));
    assert!(service.get_terms(Vec::<String>::new()).unwrap().is_empty());
}

// =============================================================================
// Search
// =============================================================================

#[test]
fn test_find_terms_blank_query() {
    let ontology = Arc::new(TestOntology::new("a").term("obo:x", "brain"));
    let service = service_with(vec![Arc::clone(&ontology)]);

    assert!(service.find_terms("   ", 10).unwrap().is_empty());
    assert_eq!(TestOntology::count(&ontology.searches), 0);
    assert_eq!(TestOntology::count(&ontology.lookups), 0);
}

#[test]
fn test_find_terms_by_uri_uses_lookup() {
    let uri = "http://purl.obolibrary.org/obo/UBERON_0000955";
    let ontology = Arc::new(TestOntology::new("uberon").term(uri, "brain"));
    let service = service_with(vec![Arc::clone(&ontology)]);

    let found = service.find_terms(uri, 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uri(), uri);
    assert_eq!(TestOntology::count(&ontology.searches), 0);
}

#[test]
fn test_find_terms_ranks_deduplicates_and_limits() {
    let a = Arc::new(
        TestOntology::new("a")
            .scored("obo:brain", "brain", 0.9)
            .scored("obo:brainstem", "brainstem", 0.4)
            .scored("obo:forebrain", "forebrain", 0.6),
    );
    let b = Arc::new(
        TestOntology::new("b")
            .scored("obo:brain", "brain", 0.7)
            .scored("obo:hindbrain", "hindbrain", 0.8),
    );
    let service = service_with(vec![a, b]);

    let found = service.find_terms("brain", 3).unwrap();
    let found_uris: Vec<&str> = found.iter().map(Term::uri).collect();
    assert_eq!(found_uris, vec!["obo:brain", "obo:hindbrain", "obo:forebrain"]);
}

#[test]
fn test_find_terms_served_from_search_cache() {
    let ontology = Arc::new(TestOntology::new("a").term("obo:x", "brain"));
    let service = service_with(vec![Arc::clone(&ontology)]);

    let first = service.find_terms("brain", 10).unwrap();
    let second = service.find_terms("brain", 10).unwrap();

    assert_eq!(first, second);
    assert_eq!(TestOntology::count(&ontology.searches), 1);
    assert_eq!(service.stats().term_search.hits, 1);
}

#[test]
fn test_search_waiter_recovers_when_shared_search_times_out() {
    let efo = Arc::new(
        TestOntology::new("efo")
            .term("efo:1", "heart muscle")
            .stalling_next_search(),
    );
    let config = CoordinatorConfig::builder()
        .with_timeout(Duration::from_millis(300))
        .with_check_interval(Duration::from_millis(20))
        .build();
    let service = Arc::new(service_with_config(vec![Arc::clone(&efo)], config));

    let first = {
        let service = Arc::clone(&service);
        thread::spawn(move || service.find_terms("heart", 10))
    };
    thread::sleep(Duration::from_millis(100));

    // Joins the stalled search, which is cancelled when the first call times out.
    let hits = service.find_terms("heart", 10).unwrap();
    let found: Vec<&str> = hits.iter().map(Term::uri).collect();
    assert_eq!(found, vec!["efo:1"]);

    assert!(first.join().unwrap().unwrap_err().is_timeout());
    assert_eq!(TestOntology::count(&efo.searches), 2);
}

#[test]
fn test_find_terms_surfaces_search_error() {
    let service = service_with(vec![Arc::new(TestOntology::new("a").rejecting_search())]);

    let err = service.find_terms("brain AND", 10).unwrap_err();
    assert!(matches!(
        err.as_search(),
        Some(SearchError::MalformedQuery { .. })
    ));
    assert!(service.stats().term_search.entries == 0);
}

#[test]
fn test_find_terms_skips_search_disabled_providers() {
    let indexed = Arc::new(TestOntology::new("indexed").term("obo:x", "brain"));
    let unindexed = Arc::new(TestOntology::new("unindexed").term("obo:y", "brain").without_search());
    let service = service_with(vec![Arc::clone(&indexed), Arc::clone(&unindexed)]);

    let found = service.find_terms("brain", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(TestOntology::count(&unindexed.searches), 0);
}

#[test]
fn test_find_resources() {
    let service = service_with(vec![Arc::new(TestOntology::new("a").term("obo:x", "brain"))]);

    let found = service.find_resources("brain", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uri(), "obo:x");
    assert!(service.find_resources("", 10).unwrap().is_empty());
}

// =============================================================================
// Hierarchy
// =============================================================================

#[test]
fn test_direct_parents() {
    let ontology = Arc::new(
        TestOntology::new("a")
            .term("obo:x", "x")
            .term("obo:y", "y")
            .term("obo:z", "z")
            .is_a("obo:x", "obo:y")
            .is_a("obo:y", "obo:z"),
    );
    let service = service_with(vec![ontology]);

    let parents = service.get_parents(&terms(&["obo:x"]), true, false).unwrap();
    assert_eq!(uris(&parents), vec!["obo:y"]);

    let ancestors = service.get_parents(&terms(&["obo:x"]), false, false).unwrap();
    assert_eq!(uris(&ancestors), vec!["obo:y", "obo:z"]);
}

#[test]
fn test_ancestry_followed_across_providers() {
    let a = Arc::new(TestOntology::new("a").term("obo:y", "y").is_a("obo:x", "obo:y"));
    let b = Arc::new(
        TestOntology::new("b")
            .term("obo:z", "z")
            .term("obo:root", "root")
            .is_a("obo:y", "obo:z")
            .is_a("obo:z", "obo:root"),
    );
    let service = service_with(vec![a, b]);

    let ancestors = service.get_parents(&terms(&["obo:x"]), false, false).unwrap();
    assert_eq!(uris(&ancestors), vec!["obo:root", "obo:y", "obo:z"]);

    let direct = service.get_parents(&terms(&["obo:x"]), true, false).unwrap();
    assert_eq!(uris(&direct), vec!["obo:y"]);
}

#[test]
fn test_unlabelled_results_replaced_or_dropped() {
    // a knows the edges but not the labels; b has a label for p only.
    let a = Arc::new(
        TestOntology::new("a")
            .unlabelled("obo:p")
            .unlabelled("obo:q")
            .is_a("obo:x", "obo:p")
            .is_a("obo:x", "obo:q"),
    );
    let b = Arc::new(TestOntology::new("b").term("obo:p", "parent"));
    let service = service_with(vec![a, b]);

    let parents = service.get_parents(&terms(&["obo:x"]), true, false).unwrap();
    assert_eq!(parents.len(), 1);
    let parent = parents.get(0).unwrap();
    assert_eq!(parent.uri(), "obo:p");
    assert_eq!(parent.label(), Some("parent"));
}

#[test]
fn test_children() {
    let ontology = Arc::new(
        TestOntology::new("a")
            .term("obo:x", "x")
            .term("obo:y", "y")
            .is_a("obo:x", "obo:y"),
    );
    let service = service_with(vec![ontology]);

    let children = service.get_children(&terms(&["obo:y"]), true, false).unwrap();
    assert_eq!(uris(&children), vec!["obo:x"]);
    assert!(service.get_children(&TermSet::empty(), true, false).unwrap().is_empty());
}

#[test]
fn test_hierarchy_cached() {
    let ontology = Arc::new(TestOntology::new("a").term("obo:y", "y").is_a("obo:x", "obo:y"));
    let service = service_with(vec![Arc::clone(&ontology)]);

    service.get_parents(&terms(&["obo:x"]), true, false).unwrap();
    service.get_parents(&terms(&["obo:x"]), true, false).unwrap();

    assert_eq!(TestOntology::count(&ontology.hierarchy_queries), 1);
    let stats = service.stats();
    assert_eq!(stats.hierarchy.cache.hits, 1);
    assert_eq!(stats.hierarchy.cache.misses, 1);
}

// =============================================================================
// Maintenance
// =============================================================================

#[test]
fn test_reindex_evicts_search_cache() {
    let ontology = Arc::new(TestOntology::new("a").term("obo:x", "brain"));
    let service = service_with(vec![Arc::clone(&ontology)]);

    service.find_terms("brain", 10).unwrap();
    let handle = service.reindex(&ProviderId::new("a")).unwrap();
    handle.wait();
    service.find_terms("brain", 10).unwrap();

    assert_eq!(TestOntology::count(&ontology.reindexed), 1);
    assert_eq!(TestOntology::count(&ontology.searches), 2);
}

#[test]
fn test_reinitialize_evicts_hierarchy_cache() {
    let ontology = Arc::new(TestOntology::new("a").term("obo:y", "y").is_a("obo:x", "obo:y"));
    let service = service_with(vec![Arc::clone(&ontology)]);

    service.get_parents(&terms(&["obo:x"]), true, false).unwrap();
    service.reinitialize(&ProviderId::new("a")).unwrap().wait();
    service.get_parents(&terms(&["obo:x"]), true, false).unwrap();

    assert_eq!(TestOntology::count(&ontology.reinitialized), 1);
    assert_eq!(TestOntology::count(&ontology.hierarchy_queries), 2);
}

#[test]
fn test_maintenance_of_unknown_provider() {
    let service = service_with(vec![Arc::new(TestOntology::new("a"))]);
    let err = service.reindex(&ProviderId::new("mondo")).unwrap_err();
    assert!(matches!(err, ServiceError::UnknownProvider(_)));
    assert!(service.reinitialize(&ProviderId::new("mondo")).is_err());
}

#[test]
fn test_bulk_maintenance_selects_eligible_providers() {
    let loaded = Arc::new(TestOntology::new("loaded"));
    let unloaded = Arc::new(TestOntology::new("unloaded"));
    unloaded.loaded.store(false, Ordering::SeqCst);
    let unindexed = Arc::new(TestOntology::new("unindexed").without_search());
    let disabled = Arc::new(TestOntology::new("disabled").disabled());
    let service = service_with(vec![
        Arc::clone(&loaded),
        Arc::clone(&unloaded),
        Arc::clone(&unindexed),
        Arc::clone(&disabled),
    ]);

    let reindexing = service.reindex_all();
    assert_eq!(reindexing.len(), 1);
    reindexing.iter().for_each(|h| h.wait());

    let reinitializing = service.reinitialize_all();
    assert_eq!(reinitializing.len(), 2);
    reinitializing.iter().for_each(|h| h.wait());

    assert_eq!(TestOntology::count(&loaded.reindexed), 1);
    assert_eq!(TestOntology::count(&loaded.reinitialized), 1);
    assert_eq!(TestOntology::count(&unindexed.reinitialized), 1);
    assert_eq!(TestOntology::count(&unloaded.reinitialized), 0);
    assert_eq!(TestOntology::count(&disabled.reindexed), 0);
}

// =============================================================================
// Providers
// =============================================================================

#[test]
fn test_register_and_deregister() {
    let a = Arc::new(TestOntology::new("a").term("obo:y", "y").is_a("obo:x", "obo:y"));
    let service = service_with(vec![Arc::clone(&a)]);

    service.get_parents(&terms(&["obo:x"]), true, false).unwrap();
    assert_eq!(service.stats().hierarchy.cache.entries, 1);

    let err = service
        .register_provider(Arc::new(TestOntology::new("a")))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Coordinator(CoordinatorError::DuplicateProvider(_))
    ));

    let b = Arc::new(TestOntology::new("b").term("obo:z", "z").is_a("obo:x", "obo:z"));
    service.register_provider(Arc::clone(&b) as SharedProvider).unwrap();
    let parents = service.get_parents(&terms(&["obo:x"]), true, false).unwrap();
    assert_eq!(uris(&parents), vec!["obo:y", "obo:z"]);

    assert!(service.deregister_provider(&ProviderId::new("a")).is_some());
    assert!(service.deregister_provider(&ProviderId::new("a")).is_none());
    assert_eq!(service.stats().hierarchy.cache.entries, 0);

    let parents = service.get_parents(&terms(&["obo:x"]), true, false).unwrap();
    assert_eq!(uris(&parents), vec!["obo:z"]);
}

#[test]
fn test_unloaded_provider_is_ignored_until_loaded() {
    let a = Arc::new(TestOntology::new("a").term("obo:x", "x"));
    a.loaded.store(false, Ordering::SeqCst);
    let service = service_with(vec![Arc::clone(&a)]);

    assert!(service.get_term("obo:x").unwrap().is_none());
    assert_eq!(TestOntology::count(&a.lookups), 0);

    a.loaded.store(true, Ordering::SeqCst);
    assert!(service.get_term("obo:x").unwrap().is_some());
}

#[test]
fn test_stats_display() {
    let service = service_with(vec![Arc::new(TestOntology::new("a"))]);
    let stats = service.stats();
    assert_eq!(stats.providers, 1);
    assert_eq!(stats.available_providers, 1);
    assert!(stats.to_string().contains("Ontology Service Statistics"));
}

#[test]
fn test_invalidate_counts_all_caches() {
    let a = Arc::new(
        TestOntology::new("a")
            .term("obo:x", "brain")
            .term("obo:y", "y")
            .is_a("obo:x", "obo:y"),
    );
    let service = service_with(vec![a]);

    service.get_parents(&terms(&["obo:x"]), true, false).unwrap();
    service.find_terms("brain", 10).unwrap();
    service.find_resources("brain", 10).unwrap();

    assert_eq!(service.invalidate(&ProviderId::new("a")), 3);
    assert_eq!(service.invalidate(&ProviderId::new("a")), 0);
}
