//! Immutable, order-independent sets of terms.

use std::fmt;
use std::sync::Arc;

use crate::term::Term;

/// An immutable snapshot of a duplicate-free set of terms.
///
/// Terms are stored sorted by URI, so two term sets built from the same terms
/// in any order compare and hash equally. A `TermSet` cannot be mutated once
/// built: every operation that changes membership returns a new set. This
/// makes it safe to embed in cache keys that other threads may be looking up
/// concurrently.
///
/// Cloning is cheap (reference-counted).
///
/// # Example
///
/// ```rust
/// use ontology_model::{Term, TermSet};
///
/// let set = TermSet::new([Term::new("http://x/b"), Term::new("http://x/a"), Term::new("http://x/b")]);
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.get(0).map(|t| t.uri()), Some("http://x/a"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TermSet {
    terms: Arc<[Term]>,
}

impl TermSet {
    /// Builds a term set, sorting by URI and dropping duplicates.
    ///
    /// When the input contains several terms with the same URI, the first one
    /// encountered is kept.
    pub fn new<I: IntoIterator<Item = Term>>(terms: I) -> Self {
        let mut terms: Vec<Term> = terms.into_iter().collect();
        terms.sort_by(|a, b| a.uri().cmp(b.uri()));
        terms.dedup_by(|later, earlier| later.uri() == earlier.uri());
        Self::from_sorted(terms)
    }

    /// Returns the empty term set.
    pub fn empty() -> Self {
        Self::from_sorted(Vec::new())
    }

    /// Builds a set containing a single term.
    pub fn single(term: Term) -> Self {
        Self::from_sorted(vec![term])
    }

    // Callers guarantee the input is sorted and duplicate-free.
    fn from_sorted(terms: Vec<Term>) -> Self {
        Self {
            terms: Arc::from(terms),
        }
    }

    /// Returns the number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns the term at `index` in URI order.
    pub fn get(&self, index: usize) -> Option<&Term> {
        self.terms.get(index)
    }

    /// Returns the terms as a slice, sorted by URI.
    pub fn as_slice(&self) -> &[Term] {
        &self.terms
    }

    /// Returns an iterator over the terms in URI order.
    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.terms.iter()
    }

    /// Checks membership of a term.
    pub fn contains(&self, term: &Term) -> bool {
        self.contains_uri(term.uri())
    }

    /// Checks membership by URI.
    pub fn contains_uri(&self, uri: &str) -> bool {
        self.terms
            .binary_search_by(|probe| probe.uri().cmp(uri))
            .is_ok()
    }

    /// Returns the terms at the given positions.
    ///
    /// `indices` must be strictly increasing; out-of-range indices are ignored.
    pub fn select(&self, indices: &[usize]) -> Self {
        let picked = indices
            .iter()
            .filter_map(|&i| self.terms.get(i).cloned())
            .collect();
        Self::from_sorted(picked)
    }

    /// Returns every term except those at the given positions.
    ///
    /// `indices` must be strictly increasing.
    pub fn without(&self, indices: &[usize]) -> Self {
        let mut skip = indices.iter().copied().peekable();
        let mut kept = Vec::with_capacity(self.terms.len().saturating_sub(indices.len()));
        for (i, term) in self.terms.iter().enumerate() {
            if skip.peek() == Some(&i) {
                skip.next();
                continue;
            }
            kept.push(term.clone());
        }
        Self::from_sorted(kept)
    }

    /// Returns the union of two sets.
    pub fn union(&self, other: &TermSet) -> Self {
        Self::new(self.iter().chain(other.iter()).cloned())
    }

    /// Returns the terms of `self` that are not in `other`.
    pub fn difference(&self, other: &TermSet) -> Self {
        let kept = self
            .iter()
            .filter(|t| !other.contains(t))
            .cloned()
            .collect();
        Self::from_sorted(kept)
    }

    /// Returns true if every term of `self` is also in `other`.
    pub fn is_subset(&self, other: &TermSet) -> bool {
        self.iter().all(|t| other.contains(t))
    }

    /// Copies the terms into a Vec, sorted by URI.
    pub fn to_vec(&self) -> Vec<Term> {
        self.terms.to_vec()
    }
}

impl Default for TermSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<Term> for TermSet {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a TermSet {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

impl fmt::Debug for TermSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.terms.iter().map(|t| t.uri()))
            .finish()
    }
}

impl fmt::Display for TermSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terms.len() {
            1 => write!(f, "{}", self.terms[0].uri()),
            n => write!(f, "{} terms", n),
        }
    }
}
