//! # ontology-cache
//!
//! Caching for coordinated ontology queries, and the [`OntologyService`]
//! facade that applications use.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`SingleFlightCache`] | LRU/TTL store; one computation per missing key |
//! | [`SubsetReuseCache`] | Parent/child lookups that extend cached subsets |
//! | [`OntologyService`] | Term lookup, search, hierarchy and maintenance |
//!
//! ## Subset reuse
//!
//! Hierarchy results are cached per [`QueryKey`]: provider group, term set,
//! flags and direction. When `{x, y}` is cached and `{x, y, z}` is asked for,
//! only `{z}` reaches the providers. How many terms may be dropped when
//! looking for a cached subset is set by [`SubsetReuseConfig`]:
//!
//! | Query size | Terms dropped (default) |
//! |------------|-------------------------|
//! | below 100 | up to 2 |
//! | 100 or more | 1 |
//!
//! ## Quick Start
//!
//! ```ignore
//! use ontology_cache::{OntologyService, ServiceConfig};
//! use ontology_coordinator::ProviderRegistry;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ProviderRegistry::with_providers([uberon, cell_ontology])?);
//! let service = OntologyService::with_config(registry, ServiceConfig::default())?;
//!
//! let parents = service.get_parents(&terms, true, false)?;
//! println!("{}", service.stats());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` - Serde support for the model types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod combinations;
mod config;
mod error;
mod key;
mod service;
mod store;
mod subset;

// Public re-exports
pub use combinations::{binomial, Combinations};
pub use config::{CacheConfig, ServiceConfig, ServiceConfigBuilder, SubsetReuseConfig};
pub use error::{ServiceError, ServiceResult};
pub use key::{QueryKey, SearchKey};
pub use service::{OntologyService, ServiceStats};
pub use store::{CacheStats, SingleFlightCache};
pub use subset::{SubsetReuseCache, SubsetReuseStats};
