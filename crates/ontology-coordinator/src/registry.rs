//! Explicit registry of ontology providers.

use std::sync::Arc;

use ontology_model::{ProviderGroup, ProviderId};
use parking_lot::RwLock;
use tracing::info;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::OntologyProvider;

/// Shared handle to a provider.
pub type SharedProvider = Arc<dyn OntologyProvider>;

/// The set of providers known to a coordinator.
///
/// Providers are added and removed explicitly; lookups return snapshots so a
/// coordinated call never holds the registry lock while waiting on providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<Vec<SharedProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from a list of providers.
    ///
    /// Fails if two providers share an id.
    pub fn with_providers<I>(providers: I) -> CoordinatorResult<Self>
    where
        I: IntoIterator<Item = SharedProvider>,
    {
        let registry = Self::new();
        for provider in providers {
            registry.register(provider)?;
        }
        Ok(registry)
    }

    /// Adds a provider. Ids must be unique.
    pub fn register(&self, provider: SharedProvider) -> CoordinatorResult<()> {
        let mut providers = self.providers.write();
        if providers.iter().any(|p| p.id() == provider.id()) {
            return Err(CoordinatorError::DuplicateProvider(provider.id().clone()));
        }
        info!("Registered ontology provider {}", provider.id());
        providers.push(provider);
        Ok(())
    }

    /// Removes a provider, returning it if it was registered.
    pub fn deregister(&self, id: &ProviderId) -> Option<SharedProvider> {
        let mut providers = self.providers.write();
        let position = providers.iter().position(|p| p.id() == id)?;
        info!("Deregistered ontology provider {}", id);
        Some(providers.remove(position))
    }

    /// Looks up a provider by id.
    pub fn get(&self, id: &ProviderId) -> Option<SharedProvider> {
        self.providers
            .read()
            .iter()
            .find(|p| p.id() == id)
            .cloned()
    }

    /// Snapshot of every registered provider, in registration order.
    pub fn all(&self) -> Vec<SharedProvider> {
        self.providers.read().clone()
    }

    /// Snapshot of the providers that are enabled and loaded.
    pub fn available(&self) -> Vec<SharedProvider> {
        self.providers
            .read()
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect()
    }

    /// Group of the given providers' ids.
    pub fn group_of(providers: &[SharedProvider]) -> ProviderGroup {
        providers.iter().map(|p| p.id().clone()).collect()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Returns true if no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self
            .providers
            .read()
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        f.debug_struct("ProviderRegistry")
            .field("providers", &ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use ontology_model::{ProviderResult, SearchHit, Term, TermSet};

    struct StubProvider {
        id: ProviderId,
        loaded: bool,
    }

    impl OntologyProvider for StubProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn is_ontology_loaded(&self) -> bool {
            self.loaded
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
            _terms: &TermSet,
            _direct: bool,
            _include_additional_properties: bool,
            _cancel: &CancellationToken,
        ) -> ProviderResult<Vec<Term>> {
            Ok(Vec::new())
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

    fn stub(id: &str, loaded: bool) -> SharedProvider {
        Arc::new(StubProvider {
            id: ProviderId::new(id),
            loaded,
        })
    }

    #[test]
    fn test_register_and_get() {
        let registry = ProviderRegistry::new();
        registry.register(stub("uberon", true)).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&ProviderId::new("uberon")).is_some());
        assert!(registry.get(&ProviderId::new("cl")).is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = ProviderRegistry::new();
        registry.register(stub("uberon", true)).unwrap();
        let err = registry.register(stub("uberon", false)).unwrap_err();
        assert!(matches!(err, CoordinatorError::DuplicateProvider(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_available_filters_unloaded() {
        let registry =
            ProviderRegistry::with_providers([stub("uberon", true), stub("cl", false)]).unwrap();
        let available = registry.available();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id().as_str(), "uberon");
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn test_deregister() {
        let registry = ProviderRegistry::with_providers([stub("uberon", true)]).unwrap();
        assert!(registry.deregister(&ProviderId::new("uberon")).is_some());
        assert!(registry.deregister(&ProviderId::new("uberon")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_group_of() {
        let providers = vec![stub("uberon", true), stub("cl", true)];
        let group = ProviderRegistry::group_of(&providers);
        assert_eq!(group.to_string(), "{cl, uberon}");
    }
}
