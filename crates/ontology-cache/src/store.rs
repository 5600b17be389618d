//! LRU cache with TTL expiration and single-flight computation.
//!
//! [`SingleFlightCache`] is the engine behind every cache in this crate. On
//! top of a plain LRU/TTL store it guarantees that concurrent requests for the
//! same missing key run the supplier once: the first caller computes, the
//! others block until it finishes and receive the same outcome.
//!
//! | Situation | What callers see |
//! |-----------|------------------|
//! | Entry present and fresh | the cached value, no supplier call |
//! | Entry missing, no computation running | this caller runs the supplier |
//! | Entry missing, computation running | wait, then share its value or error |
//! | Supplier failed | error to every waiter, nothing cached |
//! | Supplier panicked | waiters retry, one of them computes |
//! | Key evicted while computing | waiters get the result, nothing cached |

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::{Condvar, Mutex};

use crate::config::CacheConfig;

/// A cached value with its creation time.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.created_at.elapsed() > ttl)
    }
}

/// State of an in-progress computation.
enum FlightState<V, E> {
    Running,
    Done(Result<V, E>),
    Abandoned,
}

/// A computation other callers can wait on.
struct Flight<V, E> {
    state: Mutex<FlightState<V, E>>,
    finished: Condvar,
    // Set under the entries lock when the key is evicted mid-computation.
    stale: AtomicBool,
}

impl<V: Clone, E: Clone> Flight<V, E> {
    fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Running),
            finished: Condvar::new(),
            stale: AtomicBool::new(false),
        }
    }

    fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Blocks until the leader finishes. `None` means the leader gave up.
    fn wait(&self) -> Option<Result<V, E>> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                FlightState::Running => self.finished.wait(&mut state),
                FlightState::Done(outcome) => return Some(outcome.clone()),
                FlightState::Abandoned => return None,
            }
        }
    }

    fn finish(&self, state: FlightState<V, E>) {
        *self.state.lock() = state;
        self.finished.notify_all();
    }
}

enum Role<V, E> {
    Leader(Arc<Flight<V, E>>),
    Follower(Arc<Flight<V, E>>),
}

/// Thread-safe LRU cache with TTL expiration and single-flight computation.
///
/// # Example
///
/// ```rust
/// use ontology_cache::{CacheConfig, SingleFlightCache};
///
/// let cache: SingleFlightCache<String, usize, String> =
///     SingleFlightCache::new(CacheConfig::default());
///
/// let len = cache.get_or_try_insert_with(&"brain".to_string(), || Ok(5));
/// assert_eq!(len, Ok(5));
///
/// // Served from the cache: the supplier is not called again
/// let again = cache.get_or_try_insert_with(&"brain".to_string(), || Err("unused".to_string()));
/// assert_eq!(again, Ok(5));
/// ```
pub struct SingleFlightCache<K, V, E> {
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    flights: Mutex<HashMap<K, Arc<Flight<V, E>>>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V, E> SingleFlightCache<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    /// Creates a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_capacity(config.max_entries, config.ttl)
    }

    /// Creates a cache with custom capacity and TTL.
    pub fn with_capacity(max_entries: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            flights: Mutex::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Gets a fresh entry, promoting it to most-recently-used.
    ///
    /// Does not wait for computations in progress and does not touch the
    /// hit/miss counters.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let expired = entries.get(key)?.is_expired(self.ttl);
        if expired {
            entries.pop(key);
            return None;
        }
        entries.peek(key).map(|entry| entry.value.clone())
    }

    /// Returns true if a fresh entry exists, without affecting LRU order.
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .lock()
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(self.ttl))
    }

    /// Stores a value, evicting the least recently used entry if full.
    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        self.put(&mut entries, key, value);
    }

    fn put(&self, entries: &mut LruCache<K, CacheEntry<V>>, key: K, value: V) {
        if entries.len() == entries.cap().get() && !entries.contains(&key) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        entries.put(key, CacheEntry::new(value));
    }

    /// Returns the cached value for `key`, computing it with `supplier` on a
    /// miss.
    ///
    /// At most one supplier runs per key at a time. Callers arriving while it
    /// runs wait and receive its outcome. A successful value is cached; an
    /// error is returned to the caller and every waiter, and nothing is
    /// cached. Computations for distinct keys run concurrently.
    ///
    /// If the key is evicted (by [`remove`](Self::remove),
    /// [`evict_if`](Self::evict_if) or [`clear`](Self::clear)) while the
    /// supplier runs, the result still reaches this caller and its waiters
    /// but is not cached, and later callers start a new computation.
    ///
    /// The supplier must not request the same key from this cache.
    pub fn get_or_try_insert_with<F>(&self, key: &K, supplier: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.get_or_try_compute(key, || supplier().map(|value| (value, true)))
    }

    /// Like [`get_or_try_insert_with`](Self::get_or_try_insert_with), but the
    /// supplier also says whether its value may be cached.
    ///
    /// A value returned with `false` is handed to the caller and every waiter
    /// of this computation, then forgotten.
    pub fn get_or_try_compute<F>(&self, key: &K, supplier: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<(V, bool), E>,
    {
        let flight = loop {
            if let Some(value) = self.get(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }
            match self.join_or_lead(key) {
                Role::Leader(flight) => break flight,
                Role::Follower(flight) => {
                    if let Some(outcome) = flight.wait() {
                        self.coalesced.fetch_add(1, Ordering::Relaxed);
                        return outcome;
                    }
                }
            }
        };

        let mut guard = FlightGuard {
            cache: self,
            key,
            flight: Some(Arc::clone(&flight)),
        };

        // A previous leader may have stored the value after our first lookup.
        if let Some(value) = self.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            guard.complete(Ok(value.clone()));
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let outcome = supplier().map(|(value, cacheable)| {
            if cacheable {
                let mut entries = self.entries.lock();
                if !flight.is_stale() {
                    self.put(&mut entries, key.clone(), value.clone());
                }
            }
            value
        });
        guard.complete(outcome.clone());
        outcome
    }

    /// Removes one entry. A computation running for `key` will not cache its
    /// result.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        self.detach_flights(|k| k == key);
        entries.pop(key).map(|entry| entry.value)
    }

    /// Removes every entry whose key matches `predicate`.
    ///
    /// Returns the number of entries removed. Computations running for a
    /// matching key will not cache their results, and new requests for that
    /// key start a fresh computation.
    pub fn evict_if<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let mut entries = self.entries.lock();
        self.detach_flights(&predicate);
        let doomed: Vec<K> = entries
            .iter()
            .filter(|(key, _)| predicate(*key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Removes expired entries.
    pub fn cleanup_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.entries.lock();
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Clears all entries. Running computations will not cache their
    /// results.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        self.detach_flights(|_| true);
        entries.clear();
    }

    /// Returns the number of entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        let expired = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .count();
        CacheStats {
            entries: entries.len(),
            expired_entries: expired,
            in_flight: self.flights.lock().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    // Callers hold the entries lock, so a leader cannot slip its insert in
    // between the check and the eviction.
    fn detach_flights<P>(&self, predicate: P)
    where
        P: Fn(&K) -> bool,
    {
        self.flights.lock().retain(|key, flight| {
            if predicate(key) {
                flight.mark_stale();
                false
            } else {
                true
            }
        });
    }

    fn join_or_lead(&self, key: &K) -> Role<V, E> {
        let mut flights = self.flights.lock();
        if let Some(flight) = flights.get(key) {
            return Role::Follower(Arc::clone(flight));
        }
        let flight = Arc::new(Flight::new());
        flights.insert(key.clone(), Arc::clone(&flight));
        Role::Leader(flight)
    }
}

impl<K: Hash + Eq, V, E> std::fmt::Debug for SingleFlightCache<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlightCache")
            .field("entries", &self.entries.lock().len())
            .field("in_flight", &self.flights.lock().len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Publishes the leader's outcome and unregisters its flight.
///
/// Dropped without completing (the supplier panicked), it marks the flight
/// abandoned so waiters retry.
struct FlightGuard<'a, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    cache: &'a SingleFlightCache<K, V, E>,
    key: &'a K,
    flight: Option<Arc<Flight<V, E>>>,
}

impl<K, V, E> FlightGuard<'_, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    fn complete(&mut self, outcome: Result<V, E>) {
        self.release(FlightState::Done(outcome));
    }

    fn release(&mut self, state: FlightState<V, E>) {
        if let Some(flight) = self.flight.take() {
            let mut flights = self.cache.flights.lock();
            // A detached flight may have been replaced by a newer one.
            if flights
                .get(self.key)
                .is_some_and(|current| Arc::ptr_eq(current, &flight))
            {
                flights.remove(self.key);
            }
            drop(flights);
            flight.finish(state);
        }
    }
}

impl<K, V, E> Drop for FlightGuard<'_, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    fn drop(&mut self) {
        self.release(FlightState::Abandoned);
    }
}

/// Statistics about a cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored.
    pub entries: usize,
    /// Stored entries past their TTL.
    pub expired_entries: usize,
    /// Computations currently running.
    pub in_flight: usize,
    /// Requests answered from the store.
    pub hits: u64,
    /// Requests that ran the supplier.
    pub misses: u64,
    /// Requests that waited on another caller's computation.
    pub coalesced: u64,
    /// Entries pushed out by the capacity limit.
    pub evictions: u64,
}

impl CacheStats {
    /// Returns the hit rate as a percentage, counting coalesced requests as
    /// hits.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.coalesced;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            (served as f64 / total as f64) * 100.0
        }
    }
}
