//! Batch dispatcher with in-flight deduplication and bounded concurrency.
//!
//! URLs are admitted into a process-wide in-flight set before any work
//! starts, processed in sequential windows whose members run concurrently,
//! and released when the dispatch finishes, panics or is cancelled.

pub mod priority;

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;

pub use priority::{prioritize, url_priority};

/// Scheduling knobs for [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Upper bound on concurrent pipeline runs per window.
    pub max_concurrency: usize,
    /// Scale window size with batch size instead of always using the maximum.
    pub dynamic_concurrency: bool,
    /// Reorder URLs by [`url_priority`] before windowing.
    pub priority_scheduling: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self { max_concurrency: 5, dynamic_concurrency: true, priority_scheduling: false }
    }
}

impl DispatchSettings {
    /// Window size for a batch of `n` URLs.
    pub fn concurrency_for(&self, n: usize) -> usize {
        let max = self.max_concurrency.max(1);
        if self.dynamic_concurrency { max.min(n.isqrt() + 1) } else { max }
    }
}

type InFlight = Arc<Mutex<HashSet<String>>>;

/// Releases admitted URLs from the in-flight set when dropped.
struct InFlightGuard {
    in_flight: InFlight,
    urls: Vec<String>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        for url in &self.urls {
            set.remove(url);
        }
    }
}

/// Coordinates pipeline runs across concurrent batches.
///
/// Clones share the same in-flight set.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    settings: DispatchSettings,
    in_flight: InFlight,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings) -> Self {
        Self { settings, in_flight: Arc::default() }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Whether `url` is currently being processed by some dispatch.
    pub fn is_in_flight(&self, url: &str) -> bool {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).contains(url)
    }

    /// Claim every URL not already in flight. Repeats within `urls` are skipped.
    fn admit(&self, urls: Vec<String>) -> InFlightGuard {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let mut admitted = Vec::with_capacity(urls.len());
        for url in urls {
            if set.insert(url.clone()) {
                admitted.push(url);
            } else {
                tracing::debug!(url, "already in flight, skipping");
            }
        }
        InFlightGuard { in_flight: Arc::clone(&self.in_flight), urls: admitted }
    }

    /// Run `pipeline` for each admitted URL and collect the results.
    ///
    /// Results follow processing order, which differs from input order when
    /// priority scheduling is on. URLs already in flight elsewhere produce no
    /// result. `pipeline` is expected to encode failures in its output; a
    /// panic aborts the remaining windows but still releases every URL.
    pub async fn dispatch<F, Fut, T>(&self, urls: Vec<String>, pipeline: F) -> Vec<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.admit(urls);
        if guard.urls.is_empty() {
            return Vec::new();
        }

        let mut order = guard.urls.clone();
        if self.settings.priority_scheduling {
            prioritize(&mut order);
        }
        let concurrency = self.settings.concurrency_for(order.len());

        tracing::info!(urls = order.len(), concurrency, "dispatching batch");

        let mut results = Vec::with_capacity(order.len());
        for window in order.chunks(concurrency) {
            results.extend(join_all(window.iter().map(|url| pipeline(url.clone()))).await);
        }

        drop(guard);
        results
    }
}
