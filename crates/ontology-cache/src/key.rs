//! Cache keys.

use ontology_coordinator::{ProviderGroup, ProviderId, Relation, TermSet};

/// Key of a cached parent or child lookup.
///
/// Two lookups share a key only if they ask the same providers about the same
/// terms with the same flags. The term set is an immutable snapshot, so a key
/// never changes after it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    group: ProviderGroup,
    terms: TermSet,
    direct: bool,
    include_additional_properties: bool,
    relation: Relation,
}

impl QueryKey {
    /// Creates a key.
    pub fn new(
        group: ProviderGroup,
        terms: TermSet,
        direct: bool,
        include_additional_properties: bool,
        relation: Relation,
    ) -> Self {
        Self {
            group,
            terms,
            direct,
            include_additional_properties,
            relation,
        }
    }

    /// Same query for a different set of terms.
    pub fn with_terms(&self, terms: TermSet) -> Self {
        Self {
            group: self.group.clone(),
            terms,
            direct: self.direct,
            include_additional_properties: self.include_additional_properties,
            relation: self.relation,
        }
    }

    /// The providers asked.
    pub fn group(&self) -> &ProviderGroup {
        &self.group
    }

    /// The terms asked about.
    pub fn terms(&self) -> &TermSet {
        &self.terms
    }

    /// Whether only immediate relatives are requested.
    pub fn direct(&self) -> bool {
        self.direct
    }

    /// Whether part-of style restrictions are followed.
    pub fn include_additional_properties(&self) -> bool {
        self.include_additional_properties
    }

    /// Parents or children.
    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// Returns true if the key's provider group includes `provider`.
    pub fn references(&self, provider: &ProviderId) -> bool {
        self.group.contains(provider)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} of {} from {}",
            if self.direct { "direct" } else { "all" },
            self.relation,
            self.terms,
            self.group
        )
    }
}

/// Key of a cached per-provider search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    provider: ProviderId,
    query: String,
    max_results: usize,
}

impl SearchKey {
    /// Creates a key.
    pub fn new(provider: ProviderId, query: impl Into<String>, max_results: usize) -> Self {
        Self {
            provider,
            query: query.into(),
            max_results,
        }
    }

    /// The provider searched.
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// The query text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Result limit passed to the provider.
    pub fn max_results(&self) -> usize {
        self.max_results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontology_coordinator::Term;

    fn group(ids: &[&str]) -> ProviderGroup {
        ids.iter().map(|id| ProviderId::new(*id)).collect()
    }

    fn terms(uris: &[&str]) -> TermSet {
        uris.iter().map(|uri| Term::new(*uri)).collect()
    }

    #[test]
    fn test_key_equality_ignores_order() {
        let a = QueryKey::new(
            group(&["uberon", "cl"]),
            terms(&["obo:x", "obo:y"]),
            true,
            false,
            Relation::Parents,
        );
        let b = QueryKey::new(
            group(&["cl", "uberon"]),
            terms(&["obo:y", "obo:x"]),
            true,
            false,
            Relation::Parents,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_distinguishes_flags() {
        let base = QueryKey::new(group(&["cl"]), terms(&["obo:x"]), true, false, Relation::Parents);
        let indirect = QueryKey::new(group(&["cl"]), terms(&["obo:x"]), false, false, Relation::Parents);
        let children = QueryKey::new(group(&["cl"]), terms(&["obo:x"]), true, false, Relation::Children);
        assert_ne!(base, indirect);
        assert_ne!(base, children);
    }

    #[test]
    fn test_with_terms_keeps_everything_else() {
        let key = QueryKey::new(group(&["cl"]), terms(&["obo:x", "obo:y"]), false, true, Relation::Children);
        let narrowed = key.with_terms(terms(&["obo:x"]));
        assert_eq!(narrowed.terms().len(), 1);
        assert_eq!(narrowed.group(), key.group());
        assert!(!narrowed.direct());
        assert!(narrowed.include_additional_properties());
        assert_eq!(narrowed.relation(), Relation::Children);
    }

    #[test]
    fn test_references() {
        let key = QueryKey::new(group(&["uberon", "cl"]), terms(&["obo:x"]), true, false, Relation::Parents);
        assert!(key.references(&ProviderId::new("cl")));
        assert!(!key.references(&ProviderId::new("efo")));
    }

    #[test]
    fn test_display() {
        let key = QueryKey::new(group(&["uberon", "cl"]), terms(&["obo:x"]), true, false, Relation::Parents);
        assert_eq!(key.to_string(), "direct parents of obo:x from {cl, uberon}");
    }

    #[test]
    fn test_search_key() {
        let key = SearchKey::new(ProviderId::new("efo"), "brain", 10);
        assert_eq!(key.provider().as_str(), "efo");
        assert_eq!(key.query(), "brain");
        assert_eq!(key.max_results(), 10);
        assert_ne!(key, SearchKey::new(ProviderId::new("efo"), "brain", 20));
    }
}
