//! Provider identifiers and query relations.

use std::fmt;
use std::sync::Arc;

/// Stable name of an ontology provider.
///
/// Cache keys reference providers through their id so that cached entries
/// never keep a provider alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProviderId(Arc<str>);

impl ProviderId {
    /// Creates a provider id.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The set of providers a query was resolved against.
///
/// Order-independent and duplicate-free, like [`crate::TermSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderGroup {
    ids: Arc<[ProviderId]>,
}

impl ProviderGroup {
    /// Builds a group, sorting and de-duplicating the ids.
    pub fn new<I: IntoIterator<Item = ProviderId>>(ids: I) -> Self {
        let mut ids: Vec<ProviderId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        Self {
            ids: Arc::from(ids),
        }
    }

    /// Returns true if the group references the given provider.
    pub fn contains(&self, id: &ProviderId) -> bool {
        self.ids.binary_search(id).is_ok()
    }

    /// Returns the number of providers in the group.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the group is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates the ids in sorted order.
    pub fn iter(&self) -> std::slice::Iter<'_, ProviderId> {
        self.ids.iter()
    }
}

impl FromIterator<ProviderId> for ProviderGroup {
    fn from_iter<I: IntoIterator<Item = ProviderId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for ProviderGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(id.as_str())?;
        }
        f.write_str("}")
    }
}

/// Direction of a hierarchy query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relation {
    /// Superclasses (ancestors).
    Parents,
    /// Subclasses (descendants).
    Children,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Parents => f.write_str("parents"),
            Relation::Children => f.write_str("children"),
        }
    }
}
