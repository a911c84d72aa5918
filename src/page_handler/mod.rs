//! Per-page pipeline run inside the engine loop
//!
//! One work unit goes through `Loading -> PopupPass -> CaptchaCheck ->
//! Extracting` and always ends in exactly one stored and resolved
//! [`ScrapeResult`], even when the pipeline panics or its task is aborted.

pub mod best_effort;
pub mod captcha;
pub mod extraction;
pub mod popups;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub use best_effort::BestEffort;
pub use captcha::{CaptchaSignal, detect_captcha};
pub use extraction::{FALLBACK_SELECTORS, extract_fields, fallback_chain};
pub use popups::{PopupOutcome, dismiss_popups};

use crate::correlation::{RequestCorrelator, ResultStore};
use crate::engine::{BrowserEngine, LivePage};
use crate::error::ScrapeError;
use crate::types::{FieldMap, PageWorkUnit, ScrapeResult};

/// Runs work units against the shared engine and reports their results
pub struct PageHandler {
    engine: Arc<dyn BrowserEngine>,
    correlator: Arc<RequestCorrelator>,
    store: Arc<ResultStore>,
}

impl PageHandler {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        correlator: Arc<RequestCorrelator>,
        store: Arc<ResultStore>,
    ) -> Self {
        Self {
            engine,
            correlator,
            store,
        }
    }

    /// Process one unit to completion
    ///
    /// Never returns an error: every outcome becomes a [`ScrapeResult`]
    /// written to the store, then delivered to the waiting caller.
    pub async fn handle(&self, unit: PageWorkUnit) {
        let started = Instant::now();
        let guard = ResolveGuard {
            handler: self,
            unit: &unit,
            started,
            resolved: false,
        };

        info!("[{}] Processing: {}", unit.correlation_id, unit.url);
        let result = match self.run(&unit).await {
            Ok(data) => {
                let extracted = data.values().filter(|v| !v.is_empty()).count();
                info!(
                    "[{}] Success - extracted {} field(s) in {}ms",
                    unit.correlation_id,
                    extracted,
                    started.elapsed().as_millis()
                );
                ScrapeResult::success(&unit.url, data, started.elapsed())
            }
            Err(e) => {
                match &e {
                    ScrapeError::CaptchaBlocked => warn!(
                        "[{}] CAPTCHA detected - try enabling stealth mode or reducing concurrency",
                        unit.correlation_id
                    ),
                    other => error!(
                        "[{}] Error after {}ms: {}",
                        unit.correlation_id,
                        started.elapsed().as_millis(),
                        other
                    ),
                }
                ScrapeResult::failure(&unit.url, &e, started.elapsed())
            }
        };

        guard.complete(result);
    }

    /// Resolve `unit` without processing it, e.g. when the engine shuts down
    pub fn abandon(&self, unit: &PageWorkUnit, error: &ScrapeError) {
        debug!("[{}] Abandoned: {}", unit.correlation_id, error);
        self.publish(
            &unit.correlation_id,
            ScrapeResult::failure(&unit.url, error, Duration::ZERO),
        );
    }

    async fn run(&self, unit: &PageWorkUnit) -> Result<FieldMap, ScrapeError> {
        debug!("[{}] Loading", unit.correlation_id);
        let page = self.engine.open_page(&unit.url).await?;
        let outcome = self.process(page.as_ref(), unit).await;
        page.close().await;
        outcome
    }

    async fn process(
        &self,
        page: &dyn LivePage,
        unit: &PageWorkUnit,
    ) -> Result<FieldMap, ScrapeError> {
        let id = unit.correlation_id.as_str();
        page.wait_for_content_loaded().await?;

        debug!("[{}] PopupPass", id);
        let popups = dismiss_popups(page).await.into_logged(id, "Popup dismissal");
        if popups != PopupOutcome::default() {
            debug!("[{}] Dismissed popups: {:?}", id, popups);
        }

        debug!("[{}] CaptchaCheck", id);
        let snapshot = page.snapshot().await?;
        if let Some(signal) = detect_captcha(&snapshot).into_logged(id, "Captcha scan") {
            warn!("[{}] CAPTCHA indicator found: {}", id, signal);
            return Err(ScrapeError::CaptchaBlocked);
        }

        debug!("[{}] Extracting with {} selector(s)", id, unit.selectors.len());
        Ok(extract_fields(&snapshot, &unit.selectors))
    }

    /// Store first, then resolve, so a woken caller always finds the entry
    ///
    /// Callers unregister before evicting, so re-checking after the insert
    /// catches a caller that left in between and the entry is not orphaned.
    fn publish(&self, correlation_id: &str, result: ScrapeResult) {
        if !self.correlator.is_registered(correlation_id) {
            debug!("[{}] Caller already gone, dropping result", correlation_id);
            return;
        }
        self.store.insert(correlation_id, result.clone());
        if !self.correlator.is_registered(correlation_id) {
            debug!("[{}] Caller left while storing, evicting result", correlation_id);
            self.store.remove(correlation_id);
            return;
        }
        self.correlator.resolve(correlation_id, result);
    }
}

/// Resolves the unit with a `scraping_error` if dropped before completion
struct ResolveGuard<'a> {
    handler: &'a PageHandler,
    unit: &'a PageWorkUnit,
    started: Instant,
    resolved: bool,
}

impl ResolveGuard<'_> {
    fn complete(mut self, result: ScrapeResult) {
        self.resolved = true;
        self.handler.publish(&self.unit.correlation_id, result);
    }
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        warn!(
            "[{}] Page processing ended without a result, resolving as error",
            self.unit.correlation_id
        );
        let err = ScrapeError::Scraping("Page processing was interrupted before completion".to_string());
        self.handler.publish(
            &self.unit.correlation_id,
            ScrapeResult::failure(&self.unit.url, &err, self.started.elapsed()),
        );
    }
}
