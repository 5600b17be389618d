//! # ontology-model
//!
//! Backend-agnostic data model shared by the ontology resolution crates.
//!
//! This crate provides:
//! - **Terms and resources**: URI-keyed identifiers for ontology entities
//! - **Term sets**: immutable, order-independent snapshots used as cache key axes
//! - **Provider identifiers**: names and groups of ontology backends
//! - **Errors**: the typed failures a provider can report
//!
//! ## Identity
//!
//! | Type | Equality | Notes |
//! |------|----------|-------|
//! | [`Term`] | URI | label and obsolete flag are ignored |
//! | [`Resource`] | URI | kind and label are ignored |
//! | [`TermSet`] | set of URIs | insertion order is irrelevant |
//! | [`ProviderGroup`] | set of ids | insertion order is irrelevant |
//!
//! ## Usage
//!
//! ```rust
//! use ontology_model::{Term, TermSet};
//!
//! let a = TermSet::from_iter([Term::new("http://purl.org/x"), Term::new("http://purl.org/y")]);
//! let b = TermSet::from_iter([Term::new("http://purl.org/y"), Term::new("http://purl.org/x")]);
//! assert_eq!(a, b);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod provider;
mod term;
mod term_set;

pub use error::{ProviderError, ProviderResult, SearchError};
pub use provider::{ProviderGroup, ProviderId, Relation};
pub use term::{Resource, ResourceKind, SearchHit, Term};
pub use term_set::TermSet;
