//! Race and fan-out coordination over ontology providers.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use ontology_model::{ProviderError, ProviderResult};
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::completion::{CompletionService, Next};
use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::executor::TaskExecutor;
use crate::registry::{ProviderRegistry, SharedProvider};
use crate::traits::OntologyProvider;

/// How provider failures are reported by a fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    /// Every failure is a provider failure.
    Combine,
    /// Search errors keep their type.
    Search,
}

/// Runs queries against every available provider in parallel.
///
/// Two strategies are offered:
///
/// - **Race** ([`find_first`](Self::find_first)): returns the first non-null
///   answer and cancels the other providers. Used for lookups by URI where one
///   authoritative hit is enough.
/// - **Fan-out** ([`combine`](Self::combine), [`search`](Self::search)): waits
///   for every provider and merges the answers. Fails fast: one failing
///   provider fails the whole call.
///
/// Only providers that are enabled and loaded take part. Calls block the
/// calling thread until they complete, are interrupted through the supplied
/// interrupt token, or time out (when a timeout is configured).
///
/// # Example
///
/// ```ignore
/// use ontology_coordinator::{Coordinator, ProviderRegistry};
/// use std::sync::Arc;
///
/// let registry = Arc::new(ProviderRegistry::with_providers([uberon, cell_ontology])?);
/// let coordinator = Coordinator::with_defaults(registry)?;
///
/// let term = coordinator.find_first("term by uri", move |p, token| p.get_term(&uri, token))?;
/// ```
pub struct Coordinator {
    registry: Arc<ProviderRegistry>,
    executor: Arc<dyn TaskExecutor>,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Creates a coordinator with an explicit executor.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        executor: Arc<dyn TaskExecutor>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            config,
        }
    }

    /// Creates a coordinator with the default executor and configuration.
    pub fn with_defaults(registry: Arc<ProviderRegistry>) -> CoordinatorResult<Self> {
        Self::with_config(registry, CoordinatorConfig::default())
    }

    /// Creates a coordinator with the default executor sized from `config`.
    #[cfg(feature = "parallel")]
    pub fn with_config(
        registry: Arc<ProviderRegistry>,
        config: CoordinatorConfig,
    ) -> CoordinatorResult<Self> {
        let executor = crate::executor::PoolExecutor::new(config.worker_threads)?;
        Ok(Self::new(registry, Arc::new(executor), config))
    }

    /// Creates a coordinator with the default executor sized from `config`.
    #[cfg(not(feature = "parallel"))]
    pub fn with_config(
        registry: Arc<ProviderRegistry>,
        config: CoordinatorConfig,
    ) -> CoordinatorResult<Self> {
        let executor = crate::executor::ThreadExecutor::new();
        Ok(Self::new(registry, Arc::new(executor), config))
    }

    /// Returns the provider registry.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Returns the executor.
    pub fn executor(&self) -> &Arc<dyn TaskExecutor> {
        &self.executor
    }

    /// Returns the coordinator configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the first non-null answer from any available provider.
    ///
    /// See [`find_first_interruptible`](Self::find_first_interruptible).
    pub fn find_first<T, F>(&self, description: &str, query: F) -> CoordinatorResult<Option<T>>
    where
        T: Send + 'static,
        F: Fn(&dyn OntologyProvider, &CancellationToken) -> ProviderResult<Option<T>>
            + Send
            + Sync
            + 'static,
    {
        self.find_first_interruptible(description, query, &CancellationToken::new())
    }

    /// Races `query` across available providers.
    ///
    /// As soon as one provider answers `Some`, that answer is returned and
    /// every other task is cancelled. Returns `None` when every provider
    /// answered `None`, or when `interrupt` fires while waiting. A provider
    /// failure cancels the remaining tasks and is returned as an error.
    pub fn find_first_interruptible<T, F>(
        &self,
        description: &str,
        query: F,
        interrupt: &CancellationToken,
    ) -> CoordinatorResult<Option<T>>
    where
        T: Send + 'static,
        F: Fn(&dyn OntologyProvider, &CancellationToken) -> ProviderResult<Option<T>>
            + Send
            + Sync
            + 'static,
    {
        let providers = self.registry.available();
        let mut service = self.spawn_all(
            &providers,
            format!("Finding first result for {}", description),
            query,
        );

        let result = loop {
            match service.next(interrupt) {
                Ok(Next::Completed(completed)) => match completed.outcome {
                    Ok(Some(value)) => {
                        debug!(
                            "{} answered first for {}",
                            service.label(completed.index),
                            description
                        );
                        break Ok(Some(value));
                    }
                    Ok(None) => continue,
                    Err(source) => {
                        break Err(provider_error(
                            &providers,
                            completed.index,
                            source,
                            FailureMode::Combine,
                        ))
                    }
                },
                Ok(Next::Exhausted) => break Ok(None),
                Ok(Next::Interrupted) => {
                    warn!(
                        "Interrupted while finding first result for {}, will return nothing",
                        description
                    );
                    break Ok(None);
                }
                Err(err) => break Err(err),
            }
        };

        service.cancel_outstanding();
        result
    }

    /// Merges the answers of every available provider.
    ///
    /// See [`combine_over`](Self::combine_over).
    pub fn combine<T, C, F>(&self, description: &str, query: F) -> CoordinatorResult<HashSet<T>>
    where
        T: Eq + Hash + Send + 'static,
        C: IntoIterator<Item = T> + Send + 'static,
        F: Fn(&dyn OntologyProvider, &CancellationToken) -> ProviderResult<C>
            + Send
            + Sync
            + 'static,
    {
        let providers = self.registry.available();
        self.combine_over(&providers, description, query, &CancellationToken::new())
    }

    /// Merges the answers of every available provider, stopping early if
    /// `interrupt` fires.
    pub fn combine_interruptible<T, C, F>(
        &self,
        description: &str,
        query: F,
        interrupt: &CancellationToken,
    ) -> CoordinatorResult<HashSet<T>>
    where
        T: Eq + Hash + Send + 'static,
        C: IntoIterator<Item = T> + Send + 'static,
        F: Fn(&dyn OntologyProvider, &CancellationToken) -> ProviderResult<C>
            + Send
            + Sync
            + 'static,
    {
        let providers = self.registry.available();
        self.combine_over(&providers, description, query, interrupt)
    }

    /// Runs `query` on each of `providers` and unions the answers.
    ///
    /// Unavailable providers in the list are skipped. Waits for every task;
    /// if `interrupt` fires first, the union collected so far is returned. The
    /// first failure is returned as an error and any collected answers are
    /// discarded. Tasks still running at that point are left to finish.
    pub fn combine_over<T, C, F>(
        &self,
        providers: &[SharedProvider],
        description: &str,
        query: F,
        interrupt: &CancellationToken,
    ) -> CoordinatorResult<HashSet<T>>
    where
        T: Eq + Hash + Send + 'static,
        C: IntoIterator<Item = T> + Send + 'static,
        F: Fn(&dyn OntologyProvider, &CancellationToken) -> ProviderResult<C>
            + Send
            + Sync
            + 'static,
    {
        let mut combined = HashSet::new();
        self.fan_out(
            providers,
            description,
            query,
            interrupt,
            FailureMode::Combine,
            |items| combined.extend(items),
        )?;
        Ok(combined)
    }

    /// Fan-out for text search over every available, search-enabled provider.
    ///
    /// Like [`combine`](Self::combine), but answers are concatenated in
    /// completion order rather than de-duplicated, and a provider's
    /// [`SearchError`](ontology_model::SearchError) is returned as
    /// [`CoordinatorError::Search`] with its original value.
    pub fn search<T, C, F>(&self, description: &str, query: F) -> CoordinatorResult<Vec<T>>
    where
        T: Send + 'static,
        C: IntoIterator<Item = T> + Send + 'static,
        F: Fn(&dyn OntologyProvider, &CancellationToken) -> ProviderResult<C>
            + Send
            + Sync
            + 'static,
    {
        let providers: Vec<SharedProvider> = self
            .registry
            .available()
            .into_iter()
            .filter(|p| p.is_search_enabled())
            .collect();
        self.search_over(&providers, description, query, &CancellationToken::new())
    }

    /// Search fan-out over an explicit provider list.
    pub fn search_over<T, C, F>(
        &self,
        providers: &[SharedProvider],
        description: &str,
        query: F,
        interrupt: &CancellationToken,
    ) -> CoordinatorResult<Vec<T>>
    where
        T: Send + 'static,
        C: IntoIterator<Item = T> + Send + 'static,
        F: Fn(&dyn OntologyProvider, &CancellationToken) -> ProviderResult<C>
            + Send
            + Sync
            + 'static,
    {
        let mut hits = Vec::new();
        self.fan_out(
            providers,
            description,
            query,
            interrupt,
            FailureMode::Search,
            |items| hits.extend(items),
        )?;
        Ok(hits)
    }

    fn fan_out<T, C, F, S>(
        &self,
        providers: &[SharedProvider],
        description: &str,
        query: F,
        interrupt: &CancellationToken,
        mode: FailureMode,
        mut sink: S,
    ) -> CoordinatorResult<()>
    where
        T: Send + 'static,
        C: IntoIterator<Item = T> + Send + 'static,
        F: Fn(&dyn OntologyProvider, &CancellationToken) -> ProviderResult<C>
            + Send
            + Sync
            + 'static,
        S: FnMut(C),
    {
        let providers: Vec<SharedProvider> = providers
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect();
        let mut service = self.spawn_all(
            &providers,
            format!("Combining all the results for {}", description),
            query,
        );

        loop {
            match service.next(interrupt)? {
                Next::Completed(completed) => {
                    if completed.elapsed > self.config.slow_query_threshold {
                        warn!(
                            "Obtaining {} from {} took {} ms",
                            description,
                            service.label(completed.index),
                            completed.elapsed.as_millis()
                        );
                    }
                    match completed.outcome {
                        Ok(items) => sink(items),
                        Err(source) => {
                            return Err(provider_error(&providers, completed.index, source, mode))
                        }
                    }
                }
                Next::Exhausted => return Ok(()),
                Next::Interrupted => {
                    warn!(
                        "{} was interrupted, returning partial results",
                        service.description()
                    );
                    return Ok(());
                }
            }
        }
    }

    fn spawn_all<R, F>(
        &self,
        providers: &[SharedProvider],
        description: String,
        query: F,
    ) -> CompletionService<'_, R>
    where
        R: Send + 'static,
        F: Fn(&dyn OntologyProvider, &CancellationToken) -> ProviderResult<R>
            + Send
            + Sync
            + 'static,
    {
        let query = Arc::new(query);
        let mut service = CompletionService::new(self.executor.as_ref(), &self.config, description);
        for provider in providers {
            let query = Arc::clone(&query);
            let provider = Arc::clone(provider);
            service.submit(provider.id().to_string(), move |token| {
                (*query)(provider.as_ref(), token)
            });
        }
        service
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

// Task indices follow the order of the providers passed to spawn_all.
fn provider_error(
    providers: &[SharedProvider],
    index: usize,
    source: ProviderError,
    mode: FailureMode,
) -> CoordinatorError {
    let provider = providers
        .get(index)
        .map(|p| p.id().clone())
        .unwrap_or_else(|| ontology_model::ProviderId::new("unknown"));
    match (mode, source) {
        (FailureMode::Search, ProviderError::Search(source)) => {
            CoordinatorError::Search { provider, source }
        }
        (_, source) => CoordinatorError::Provider { provider, source },
    }
}
