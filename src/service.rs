//! Caller-facing scrape API
//!
//! [`ScrapeService::scrape`] validates a request, hands it to the shared
//! engine and waits for its result under the request's own deadline. A
//! timed-out caller never cancels the page work; its late result is reaped
//! in the background.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::correlation::{CompletionHandle, RequestCorrelator, ResultStore};
use crate::engine::EngineLifecycleManager;
use crate::error::ScrapeError;
use crate::types::{PageWorkUnit, ScrapeRequest, ScrapeResult};
use crate::utils::constants::MAX_TIMEOUT_MS;
use crate::utils::validate_url;

/// Deadlines applied by [`ScrapeService`]
#[derive(Debug, Clone, Copy)]
pub struct ServiceTimeouts {
    /// Used when a request carries no `timeout_ms`
    pub default_timeout: Duration,
    /// How long a timed-out request's late result is waited for before eviction
    pub late_result_grace: Duration,
}

/// Entry point for scrape requests
pub struct ScrapeService {
    correlator: Arc<RequestCorrelator>,
    store: Arc<ResultStore>,
    lifecycle: Arc<EngineLifecycleManager>,
    timeouts: ServiceTimeouts,
}

impl ScrapeService {
    pub fn new(
        correlator: Arc<RequestCorrelator>,
        store: Arc<ResultStore>,
        lifecycle: Arc<EngineLifecycleManager>,
        timeouts: ServiceTimeouts,
    ) -> Self {
        Self {
            correlator,
            store,
            lifecycle,
            timeouts,
        }
    }

    /// Scrape one page
    ///
    /// Invalid requests fail with [`ScrapeError::Validation`] before anything
    /// is enqueued. Everything after enqueue, including timeouts and page
    /// failures, comes back as `Ok` with the failure encoded in `meta`.
    pub async fn scrape(&self, request: ScrapeRequest) -> Result<ScrapeResult, ScrapeError> {
        let started = Instant::now();
        let deadline = self.deadline_for(&request)?;
        let unit = self.validate(request)?;
        let id = unit.correlation_id.clone();
        let url = unit.url.clone();

        let mut handle = self.correlator.register(id.clone())?;
        if let Err(e) = self.lifecycle.enqueue(unit) {
            self.correlator.unregister(&id);
            return Err(e);
        }
        if self.lifecycle.ensure_running() {
            debug!("[{}] Started engine loop", id);
        }

        match self.correlator.await_result(&mut handle, deadline).await {
            Ok(delivered) => {
                self.correlator.unregister(&id);
                // Written before resolution, so the stored copy is present here
                Ok(self.store.take(&id).unwrap_or(delivered))
            }
            Err(err @ ScrapeError::Timeout { .. }) => {
                warn!("[{}] Timed out after {}ms waiting for {}", id, deadline.as_millis(), url);
                self.spawn_reaper(handle);
                Ok(ScrapeResult::failure(url, &err, started.elapsed()))
            }
            Err(err) => {
                self.correlator.unregister(&id);
                self.store.remove(&id);
                Ok(ScrapeResult::failure(url, &err, started.elapsed()))
            }
        }
    }

    fn validate(&self, request: ScrapeRequest) -> Result<PageWorkUnit, ScrapeError> {
        validate_url(&request.url).map_err(ScrapeError::Validation)?;
        let selectors = request.selectors.unwrap_or_default();
        selectors.validate()?;

        Ok(PageWorkUnit {
            correlation_id: Uuid::new_v4().to_string(),
            url: request.url.trim().to_string(),
            selectors,
        })
    }

    fn deadline_for(&self, request: &ScrapeRequest) -> Result<Duration, ScrapeError> {
        match request.timeout_ms {
            None => Ok(self.timeouts.default_timeout),
            Some(ms) if (1..=MAX_TIMEOUT_MS).contains(&ms) => Ok(Duration::from_millis(ms)),
            Some(ms) => Err(ScrapeError::Validation(format!(
                "timeout_ms must be between 1 and {MAX_TIMEOUT_MS}, got {ms}"
            ))),
        }
    }

    /// Wait out the late result of a timed-out request, then drop its bookkeeping
    fn spawn_reaper(&self, mut handle: CompletionHandle) {
        let correlator = Arc::clone(&self.correlator);
        let store = Arc::clone(&self.store);
        let grace = self.timeouts.late_result_grace;

        tokio::spawn(async move {
            let id = handle.id().to_string();
            match correlator.await_result(&mut handle, grace).await {
                Ok(_) => debug!("[{}] Late result arrived after caller timed out, discarding", id),
                Err(e) => info!("[{}] No late result within grace period: {}", id, e),
            }
            correlator.unregister(&id);
            store.remove(&id);
        });
    }
}
