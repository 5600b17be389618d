//! The ontology provider contract.
//!
//! This module defines the [`OntologyProvider`] trait that every ontology
//! backend implements to take part in race and fan-out queries.
//!
//! # Architecture Note
//!
//! This crate does not know how an ontology is stored, reasoned over or
//! indexed. Backends live in the consuming application; the coordinator only
//! sees this trait.
//!
//! # Example: Implementing OntologyProvider
//!
//! ```ignore
//! use ontology_coordinator::{CancellationToken, OntologyProvider};
//! use ontology_model::{ProviderId, ProviderResult, SearchHit, Term, TermSet};
//!
//! impl OntologyProvider for UberonOntology {
//!     fn id(&self) -> &ProviderId {
//!         &self.id
//!     }
//!
//!     fn is_enabled(&self) -> bool {
//!         self.settings.load_uberon
//!     }
//!
//!     fn is_ontology_loaded(&self) -> bool {
//!         self.model.read().is_some()
//!     }
//!
//!     fn get_term(&self, uri: &str, _cancel: &CancellationToken) -> ProviderResult<Option<Term>> {
//!         Ok(self.lookup(uri))
//!     }
//!
//!     fn find_terms(&self, query: &str, max: usize, cancel: &CancellationToken)
//!         -> ProviderResult<Vec<SearchHit<Term>>> {
//!         self.index.search(query, max, cancel)
//!     }
//!
//!     fn get_parents(&self, terms: &TermSet, direct: bool, extra: bool, cancel: &CancellationToken)
//!         -> ProviderResult<Vec<Term>> {
//!         let mut out = Vec::new();
//!         for term in terms {
//!             cancel.check()?;
//!             out.extend(self.reasoner.superclasses(term, direct, extra));
//!         }
//!         Ok(out)
//!     }
//!
//!     fn get_children(&self, terms: &TermSet, direct: bool, extra: bool, cancel: &CancellationToken)
//!         -> ProviderResult<Vec<Term>> {
//!         // symmetric to get_parents
//!     }
//! }
//! ```

use ontology_model::{
    ProviderId, ProviderResult, Relation, Resource, SearchHit, Term, TermSet,
};

use crate::cancel::CancellationToken;

/// An independently loaded ontology backend.
///
/// Implementations must be thread-safe: the coordinator calls the same
/// provider from several worker threads at once. From the coordinator's point
/// of view providers are read-only; only [`index`](Self::index) and
/// [`initialize`](Self::initialize) change their state.
///
/// # Required Methods
///
/// - [`id`](Self::id) - Stable provider name
/// - [`is_enabled`](Self::is_enabled) / [`is_ontology_loaded`](Self::is_ontology_loaded) - Availability
/// - [`get_term`](Self::get_term) - Lookup by URI
/// - [`find_terms`](Self::find_terms) - Text search
/// - [`get_parents`](Self::get_parents) / [`get_children`](Self::get_children) - Hierarchy
///
/// Query methods receive a [`CancellationToken`] and should return
/// `Err(ProviderError::Cancelled)` (see [`CancellationToken::check`]) when it
/// fires.
pub trait OntologyProvider: Send + Sync {
    /// Returns the provider's stable id.
    fn id(&self) -> &ProviderId;

    /// Whether the provider is switched on in the application settings.
    fn is_enabled(&self) -> bool;

    /// Whether the ontology has finished loading.
    fn is_ontology_loaded(&self) -> bool;

    /// Whether the provider has a usable text search index.
    fn is_search_enabled(&self) -> bool {
        self.is_ontology_loaded()
    }

    /// Whether the provider may be queried right now.
    fn is_available(&self) -> bool {
        self.is_enabled() && self.is_ontology_loaded()
    }

    /// Looks up a term by URI.
    fn get_term(&self, uri: &str, cancel: &CancellationToken) -> ProviderResult<Option<Term>>;

    /// Looks up any resource by URI.
    ///
    /// Defaults to [`get_term`](Self::get_term).
    fn get_resource(
        &self,
        uri: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<Option<Resource>> {
        Ok(self.get_term(uri, cancel)?.map(Resource::from))
    }

    /// Searches terms by free text.
    ///
    /// Malformed queries are reported as `ProviderError::Search`.
    fn find_terms(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<SearchHit<Term>>>;

    /// Searches any resource by free text.
    ///
    /// Defaults to [`find_terms`](Self::find_terms).
    fn find_resources(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<SearchHit<Resource>>> {
        Ok(self
            .find_terms(query, max_results, cancel)?
            .into_iter()
            .map(|hit| SearchHit::new(Resource::from(hit.item), hit.score))
            .collect())
    }

    /// Gets the parents of a set of terms.
    ///
    /// With `direct` only immediate superclasses are returned, otherwise all
    /// ancestors. `include_additional_properties` also follows part-of style
    /// restrictions.
    fn get_parents(
        &self,
        terms: &TermSet,
        direct: bool,
        include_additional_properties: bool,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Term>>;

    /// Gets the children of a set of terms. Symmetric to
    /// [`get_parents`](Self::get_parents).
    fn get_children(
        &self,
        terms: &TermSet,
        direct: bool,
        include_additional_properties: bool,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Term>>;

    /// Dispatches to [`get_parents`](Self::get_parents) or
    /// [`get_children`](Self::get_children).
    fn related(
        &self,
        relation: Relation,
        terms: &TermSet,
        direct: bool,
        include_additional_properties: bool,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Term>> {
        match relation {
            Relation::Parents => {
                self.get_parents(terms, direct, include_additional_properties, cancel)
            }
            Relation::Children => {
                self.get_children(terms, direct, include_additional_properties, cancel)
            }
        }
    }

    /// Rebuilds the text search index.
    fn index(&self, force: bool) -> ProviderResult<()> {
        let _ = force;
        Ok(())
    }

    /// Reloads the ontology, optionally rebuilding its search index.
    fn initialize(&self, force: bool, with_search: bool) -> ProviderResult<()> {
        let _ = (force, with_search);
        Ok(())
    }
}
