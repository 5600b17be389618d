//! Types for the ontology service.

use crate::store::CacheStats;
use crate::subset::SubsetReuseStats;

/// Statistics about ontology service usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Parent/child cache counters.
    pub hierarchy: SubsetReuseStats,
    /// Term search cache counters.
    pub term_search: CacheStats,
    /// Resource search cache counters.
    pub resource_search: CacheStats,
    /// Registered providers.
    pub providers: usize,
    /// Providers enabled and loaded.
    pub available_providers: usize,
}

impl ServiceStats {
    /// Returns the hierarchy cache hit rate as a percentage.
    ///
    /// Misses answered from a cached subset count as half a hit, since only
    /// part of the query reached the providers.
    pub fn hierarchy_hit_rate(&self) -> f64 {
        let cache = &self.hierarchy.cache;
        let served = (cache.hits + cache.coalesced) as f64 + self.hierarchy.subset_hits as f64 / 2.0;
        let total = cache.hits + cache.coalesced + cache.misses;
        if total == 0 {
            0.0
        } else {
            (served / total as f64) * 100.0
        }
    }

    /// Returns the combined search cache hit rate as a percentage.
    pub fn search_hit_rate(&self) -> f64 {
        let served = self.term_search.hits
            + self.term_search.coalesced
            + self.resource_search.hits
            + self.resource_search.coalesced;
        let total = served + self.term_search.misses + self.resource_search.misses;
        if total == 0 {
            0.0
        } else {
            (served as f64 / total as f64) * 100.0
        }
    }
}

impl std::fmt::Display for ServiceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Ontology Service Statistics:")?;
        writeln!(
            f,
            "  Providers:       {} ({} available)",
            self.providers, self.available_providers
        )?;
        writeln!(f, "  Hierarchy:       {} entries", self.hierarchy.cache.entries)?;
        writeln!(f, "    Hits:          {}", self.hierarchy.cache.hits)?;
        writeln!(f, "    Misses:        {}", self.hierarchy.cache.misses)?;
        writeln!(f, "    Subset hits:   {}", self.hierarchy.subset_hits)?;
        writeln!(f, "    Coalesced:     {}", self.hierarchy.cache.coalesced)?;
        writeln!(f, "    Fan-outs:      {}", self.hierarchy.fan_outs)?;
        writeln!(f, "    Hit rate:      {:.1}%", self.hierarchy_hit_rate())?;
        writeln!(
            f,
            "  Search:          {} entries",
            self.term_search.entries + self.resource_search.entries
        )?;
        writeln!(f, "    Hit rate:      {:.1}%", self.search_hit_rate())?;
        Ok(())
    }
}
