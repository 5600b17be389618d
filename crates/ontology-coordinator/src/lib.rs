//! # ontology-coordinator
//!
//! Parallel coordination of queries over independently loaded ontology
//! providers.
//!
//! This crate answers "find this term" and "find the parents of these terms"
//! by asking every available [`OntologyProvider`] at once, and combining the
//! answers in one of two ways:
//!
//! | Strategy | Method | Returns | On failure |
//! |----------|--------|---------|------------|
//! | Race | [`Coordinator::find_first`] | first non-null answer | cancels the rest, returns the error |
//! | Fan-out | [`Coordinator::combine`] | union of all answers | returns the error, discards partial results |
//! | Search fan-out | [`Coordinator::search`] | concatenated hits | search errors keep their type |
//!
//! Providers that are disabled or still loading are skipped silently.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ontology_coordinator::{Coordinator, ProviderRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ProviderRegistry::new());
//! registry.register(Arc::new(uberon))?;
//! registry.register(Arc::new(cell_ontology))?;
//!
//! let coordinator = Coordinator::with_defaults(registry)?;
//!
//! // Race: the fastest provider that knows the URI wins
//! let uri = "http://purl.obolibrary.org/obo/UBERON_0000955".to_string();
//! let brain = coordinator.find_first("brain", move |p, token| p.get_term(&uri, token))?;
//!
//! // Fan-out: every provider contributes
//! let roots = coordinator.combine("root terms", |p, token| p.find_terms("root", 10, token))?;
//! ```
//!
//! ## Cancellation and interruption
//!
//! Every task receives a [`CancellationToken`]. The race cancels losing
//! tasks; providers notice at their next [`CancellationToken::check`]. Callers
//! can pass their own token to the `*_interruptible` variants: firing it makes
//! a race return `None` and a fan-out return what it has collected so far.
//!
//! ## Feature Flags
//!
//! - `parallel` (default) - Backs the default executor with a rayon thread pool
//! - `serde` - Serde support for the model types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cancel;
mod completion;
mod config;
mod coordinator;
mod error;
mod executor;
mod registry;
mod traits;

// Public re-exports
pub use cancel::CancellationToken;
pub use config::{CoordinatorConfig, CoordinatorConfigBuilder};
pub use coordinator::Coordinator;
pub use error::{CoordinatorError, CoordinatorResult};
#[cfg(feature = "parallel")]
pub use executor::PoolExecutor;
pub use executor::{submit, Job, TaskExecutor, TaskHandle, ThreadExecutor};
pub use registry::{ProviderRegistry, SharedProvider};
pub use traits::OntologyProvider;

// Re-export the model for convenience
pub use ontology_model::{
    ProviderError, ProviderGroup, ProviderId, ProviderResult, Relation, Resource, ResourceKind,
    SearchError, SearchHit, Term, TermSet,
};
