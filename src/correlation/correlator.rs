//! Registry of single-assignment completion cells keyed by correlation id
//!
//! # Lifecycle
//! - The caller registers an id *before* the matching work unit is enqueued
//! - Engine-side page work resolves the id exactly once
//! - The caller unregisters after consuming (or abandoning) the result
//!
//! Resolution never fails: a result for an id nobody is waiting on any more is
//! dropped, and a second resolution of the same id is a no-op.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::ScrapeError;
use crate::types::ScrapeResult;

/// Caller half of a registered correlation id
///
/// Awaited through [`RequestCorrelator::await_result`]. The handle may be
/// awaited again after a timeout, which is how late results are reaped.
#[derive(Debug)]
pub struct CompletionHandle {
    id: String,
    receiver: oneshot::Receiver<ScrapeResult>,
}

impl CompletionHandle {
    /// Correlation id this handle waits on
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Concurrency-safe map from correlation id to pending completion
///
/// The sender slot is an `Option` so resolution can `take()` it: the entry
/// itself stays registered until the caller side removes it.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: DashMap<String, Option<oneshot::Sender<ScrapeResult>>>,
}

impl RequestCorrelator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` and return the handle its caller will await
    ///
    /// Fails with [`ScrapeError::DuplicateId`] if `id` is already registered.
    pub fn register(&self, id: impl Into<String>) -> Result<CompletionHandle, ScrapeError> {
        let id = id.into();
        match self.pending.entry(id.clone()) {
            Entry::Occupied(_) => Err(ScrapeError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                let (sender, receiver) = oneshot::channel();
                slot.insert(Some(sender));
                trace!("[{}] Registered completion handle", id);
                Ok(CompletionHandle { id, receiver })
            }
        }
    }

    /// Complete the handle for `id` with `result`
    ///
    /// Returns `true` only when a waiting handle actually received the
    /// result. Unknown ids, repeat resolutions and abandoned handles all
    /// return `false` without error.
    pub fn resolve(&self, id: &str, result: ScrapeResult) -> bool {
        // Take the sender while holding the shard lock, send after releasing it
        let sender = match self.pending.get_mut(id) {
            Some(mut slot) => slot.take(),
            None => {
                debug!("[{}] No caller registered, dropping result", id);
                return false;
            }
        };

        match sender {
            Some(sender) => match sender.send(result) {
                Ok(()) => true,
                Err(_) => {
                    debug!("[{}] Caller stopped listening, dropping result", id);
                    false
                }
            },
            None => {
                debug!("[{}] Already resolved, ignoring repeat resolution", id);
                false
            }
        }
    }

    /// Wait for `handle` to resolve, at most `deadline`
    ///
    /// On timeout the id stays registered; the same handle can be awaited
    /// again to collect a late result.
    pub async fn await_result(
        &self,
        handle: &mut CompletionHandle,
        deadline: Duration,
    ) -> Result<ScrapeResult, ScrapeError> {
        match tokio::time::timeout(deadline, &mut handle.receiver).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(ScrapeError::Scraping(format!(
                "Completion for request {} was dropped before resolving",
                handle.id
            ))),
            Err(_) => Err(ScrapeError::Timeout {
                timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Remove bookkeeping for `id`; idempotent
    pub fn unregister(&self, id: &str) {
        if self.pending.remove(id).is_some() {
            trace!("[{}] Unregistered completion handle", id);
        }
    }

    #[must_use]
    pub fn is_registered(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
