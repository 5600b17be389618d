//! Collects task results in completion order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use ontology_model::{ProviderError, ProviderResult};
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::executor::{submit, TaskExecutor, TaskHandle};

// Upper bound on how long a wait goes without looking at the interrupt token.
const INTERRUPT_SLICE: Duration = Duration::from_millis(10);

/// A finished task.
pub(crate) struct Completed<T> {
    pub index: usize,
    pub elapsed: Duration,
    pub outcome: ProviderResult<T>,
}

/// Outcome of waiting for the next task.
pub(crate) enum Next<T> {
    Completed(Completed<T>),
    Interrupted,
    Exhausted,
}

/// Submits tasks and hands back their results as they finish.
pub(crate) struct CompletionService<'a, T> {
    executor: &'a dyn TaskExecutor,
    config: &'a CoordinatorConfig,
    description: String,
    sender: Option<Sender<Completed<T>>>,
    receiver: Receiver<Completed<T>>,
    handles: Vec<TaskHandle>,
    labels: Vec<String>,
    received: Vec<bool>,
    pending: usize,
    started: Instant,
}

impl<'a, T: Send + 'static> CompletionService<'a, T> {
    pub fn new(
        executor: &'a dyn TaskExecutor,
        config: &'a CoordinatorConfig,
        description: impl Into<String>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            executor,
            config,
            description: description.into(),
            sender: Some(sender),
            receiver,
            handles: Vec::new(),
            labels: Vec::new(),
            received: Vec::new(),
            pending: 0,
            started: Instant::now(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Submits a task. Panics inside `task` are reported as
    /// [`ProviderError::Panicked`].
    pub fn submit<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: FnOnce(&CancellationToken) -> ProviderResult<T> + Send + 'static,
    {
        let Some(sender) = self.sender.clone() else {
            return;
        };
        let index = self.handles.len();
        let handle = submit(self.executor, move |token| {
            let start = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(token)))
                .unwrap_or_else(|payload| Err(ProviderError::Panicked(panic_message(payload.as_ref()))));
            // The receiver is gone once the caller stopped waiting.
            let _ = sender.send(Completed {
                index,
                elapsed: start.elapsed(),
                outcome,
            });
        });
        self.handles.push(handle);
        self.labels.push(label.into());
        self.received.push(false);
        self.pending += 1;
    }

    pub fn label(&self, index: usize) -> &str {
        self.labels.get(index).map(String::as_str).unwrap_or("?")
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Waits for the next task to finish.
    ///
    /// Logs a warning every time the wait outlasts the current check interval;
    /// the interval grows by the configured backoff. Fails with a timeout once
    /// the configured deadline has passed.
    pub fn next(&mut self, interrupt: &CancellationToken) -> CoordinatorResult<Next<T>> {
        // Only the tasks hold senders from here on, so a lost task disconnects the channel.
        self.sender = None;
        if self.pending == 0 {
            return Ok(Next::Exhausted);
        }

        let mut recheck = self.remaining().map_or(self.config.check_interval, |r| {
            self.config.check_interval.min(r)
        });
        let mut last_check = Instant::now();

        loop {
            if interrupt.is_cancelled() {
                return Ok(Next::Interrupted);
            }

            let slice = INTERRUPT_SLICE.min(recheck.saturating_sub(last_check.elapsed()));
            match self.receiver.recv_timeout(slice) {
                Ok(completed) => {
                    if let Some(flag) = self.received.get_mut(completed.index) {
                        *flag = true;
                    }
                    self.pending -= 1;
                    return Ok(Next::Completed(completed));
                }
                Err(RecvTimeoutError::Timeout) => {
                    if last_check.elapsed() < recheck {
                        continue;
                    }
                    let remaining = self.remaining();
                    if remaining == Some(Duration::ZERO) {
                        self.cancel_outstanding();
                        return Err(CoordinatorError::Timeout {
                            description: self.description.clone(),
                            elapsed: self.started.elapsed(),
                            pending: self.pending_labels(),
                        });
                    }
                    warn!(
                        "{} is taking too long ({}/{} completed so far, {:?} elapsed). The following tasks are still running: {}",
                        self.description,
                        self.len() - self.pending,
                        self.len(),
                        self.started.elapsed(),
                        self.pending_labels().join(", ")
                    );
                    recheck = recheck.mul_f64(self.config.backoff);
                    if let Some(remaining) = remaining {
                        recheck = recheck.min(remaining);
                    }
                    last_check = Instant::now();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CoordinatorError::TaskLost {
                        description: self.description.clone(),
                    });
                }
            }
        }
    }

    /// Cancels every task that has not reported yet.
    pub fn cancel_outstanding(&self) {
        for (handle, received) in self.handles.iter().zip(&self.received) {
            if !received && !handle.is_done() {
                handle.cancel();
            }
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.config
            .timeout
            .map(|timeout| timeout.saturating_sub(self.started.elapsed()))
    }

    fn pending_labels(&self) -> Vec<String> {
        self.labels
            .iter()
            .zip(&self.received)
            .filter(|(_, received)| !**received)
            .map(|(label, _)| label.clone())
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
