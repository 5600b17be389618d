//! Configuration types for the coordinator.

use std::time::Duration;

/// Configuration for race and fan-out coordination.
///
/// # Example
///
/// ```rust
/// use ontology_coordinator::CoordinatorConfig;
/// use std::time::Duration;
///
/// let config = CoordinatorConfig::builder()
///     .with_timeout(Duration::from_secs(30))
///     .with_slow_query_threshold(Duration::from_millis(500))
///     .with_worker_threads(4)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Overall deadline for one coordinated call (None = wait indefinitely).
    pub timeout: Option<Duration>,
    /// First interval after which a still-running call logs a warning.
    pub check_interval: Duration,
    /// Factor applied to the warning interval after each warning.
    pub backoff: f64,
    /// Per-provider invocations slower than this are logged.
    pub slow_query_threshold: Duration,
    /// Worker threads for the default executor.
    pub worker_threads: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            check_interval: Duration::from_secs(1),
            backoff: 1.5,
            slow_query_threshold: Duration::from_millis(200),
            worker_threads: 8,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new builder for CoordinatorConfig.
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }
}

/// Builder for CoordinatorConfig.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorConfigBuilder {
    /// Sets the overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Sets the first "taking too long" interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval = interval;
        self
    }

    /// Sets the warning interval backoff factor (values below 1.0 are raised to 1.0).
    pub fn with_backoff(mut self, backoff: f64) -> Self {
        self.config.backoff = backoff.max(1.0);
        self
    }

    /// Sets the slow invocation threshold.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.config.slow_query_threshold = threshold;
        self
    }

    /// Sets the number of worker threads (at least one).
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads.max(1);
        self
    }

    /// Builds the CoordinatorConfig.
    pub fn build(self) -> CoordinatorConfig {
        self.config
    }
}
