//! Terms, resources and search hits.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An ontology concept, identified by its URI.
///
/// Two terms are equal when their URIs are equal; the label and the obsolete
/// flag describe the term but are not part of its identity.
///
/// # Example
///
/// ```rust
/// use ontology_model::Term;
///
/// let brain = Term::new("http://purl.obolibrary.org/obo/UBERON_0000955").with_label("brain");
/// assert_eq!(brain, Term::new("http://purl.obolibrary.org/obo/UBERON_0000955"));
/// assert_eq!(brain.label(), Some("brain"));
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Term {
    uri: String,
    label: Option<String>,
    obsolete: bool,
}

impl Term {
    /// Creates an unlabelled, non-obsolete term.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            label: None,
            obsolete: false,
        }
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Marks the term as obsolete.
    pub fn obsolete(mut self) -> Self {
        self.obsolete = true;
        self
    }

    /// Returns the term URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the label, if the provider supplied one.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns true if the term carries a label.
    pub fn has_label(&self) -> bool {
        self.label.is_some()
    }

    /// Returns true if the term is marked obsolete.
    pub fn is_obsolete(&self) -> bool {
        self.obsolete
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri.cmp(&other.uri)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} |{}|", self.uri, label),
            None => f.write_str(&self.uri),
        }
    }
}

/// What kind of entity a [`Resource`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceKind {
    /// An ontology class.
    Term,
    /// An object or datatype property.
    Property,
    /// A named individual.
    Individual,
}

/// Any addressable ontology entity, identified by its URI.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resource {
    uri: String,
    label: Option<String>,
    kind: ResourceKind,
}

impl Resource {
    /// Creates an unlabelled resource of the given kind.
    pub fn new(uri: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            uri: uri.into(),
            label: None,
            kind,
        }
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the resource URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns the resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl From<Term> for Resource {
    fn from(term: Term) -> Self {
        Self {
            uri: term.uri,
            label: term.label,
            kind: ResourceKind::Term,
        }
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

/// A search result together with the provider's relevance score.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchHit<T> {
    /// The matching term or resource.
    pub item: T,
    /// Relevance score; higher is better.
    pub score: f64,
}

impl<T> SearchHit<T> {
    /// Creates a new search hit.
    pub fn new(item: T, score: f64) -> Self {
        Self { item, score }
    }
}
