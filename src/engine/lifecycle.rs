//! Single owner of the engine's run state and the pending page queue
//!
//! # Invariants
//! - At most one processing loop exists at any instant. `ensure_running`
//!   checks and sets `is_running` in one critical section.
//! - A unit enqueued before the loop starts is processed once it starts.
//! - The loop parks only when the queue is empty, nothing is in flight and
//!   no enqueue happened for the idle grace period. The emptiness re-check
//!   and the flip of `is_running` happen under the state lock, so an
//!   enqueue racing with parking is either seen by the loop or followed by
//!   an `ensure_running` that starts a new one.
//!
//! Lock order is state, then queue. `enqueue` takes only the queue lock and
//! `ensure_running` only the state lock.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::traits::BrowserEngine;
use crate::error::ScrapeError;
use crate::page_handler::PageHandler;
use crate::types::PageWorkUnit;
use crate::utils::constants::{DEFAULT_CRAWL_CONCURRENCY, DEFAULT_ENGINE_IDLE_GRACE_MS};

/// Processing loop tuning
#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    /// Maximum pages processed at once
    pub concurrency: usize,
    /// Quiet period after which an idle loop parks
    pub idle_grace: Duration,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CRAWL_CONCURRENCY,
            idle_grace: Duration::from_millis(DEFAULT_ENGINE_IDLE_GRACE_MS),
        }
    }
}

#[derive(Default)]
struct EngineRunState {
    is_running: bool,
    loop_handle: Option<JoinHandle<()>>,
}

/// Owns the run flag, the FIFO of pending pages and the processing loop
pub struct EngineLifecycleManager {
    engine: Arc<dyn BrowserEngine>,
    handler: Arc<PageHandler>,
    options: LoopOptions,
    state: Mutex<EngineRunState>,
    queue: Mutex<VecDeque<PageWorkUnit>>,
    wake: Notify,
    last_enqueue: Mutex<Instant>,
    torn_down: AtomicBool,
    loops_started: AtomicUsize,
    cancel: CancellationToken,
}

impl EngineLifecycleManager {
    #[must_use]
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        handler: Arc<PageHandler>,
        options: LoopOptions,
    ) -> Arc<Self> {
        let options = LoopOptions {
            concurrency: options.concurrency.max(1),
            ..options
        };
        Arc::new(Self {
            engine,
            handler,
            options,
            state: Mutex::new(EngineRunState::default()),
            queue: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            last_enqueue: Mutex::new(Instant::now()),
            torn_down: AtomicBool::new(false),
            loops_started: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        })
    }

    /// Append `unit` to the pending queue
    ///
    /// Never starts the loop; callers follow up with [`ensure_running`].
    /// Fails once the manager has been shut down.
    ///
    /// [`ensure_running`]: Self::ensure_running
    pub fn enqueue(&self, unit: PageWorkUnit) -> Result<(), ScrapeError> {
        {
            let mut queue = self.queue.lock();
            if self.torn_down.load(Ordering::Acquire) {
                return Err(ScrapeError::EngineFatal(
                    "Engine is shutting down".to_string(),
                ));
            }
            debug!("[{}] Enqueued {}", unit.correlation_id, unit.url);
            queue.push_back(unit);
            *self.last_enqueue.lock() = Instant::now();
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Start the processing loop if it is not running
    ///
    /// Returns `true` when this call started it. Concurrent callers observe
    /// exactly one start.
    pub fn ensure_running(self: &Arc<Self>) -> bool {
        if self.torn_down.load(Ordering::Acquire) {
            return false;
        }

        let mut state = self.state.lock();
        if state.is_running {
            return false;
        }
        state.is_running = true;
        let started = self.loops_started.fetch_add(1, Ordering::SeqCst) + 1;
        info!(loop_number = started, "Starting engine processing loop");

        let this = Arc::clone(self);
        state.loop_handle = Some(tokio::spawn(async move { this.run_loop().await }));
        true
    }

    async fn run_loop(self: Arc<Self>) {
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            while in_flight.len() < self.options.concurrency {
                let Some(unit) = self.queue.lock().pop_front() else {
                    break;
                };
                let handler = Arc::clone(&self.handler);
                in_flight.spawn(async move { handler.handle(unit).await });
            }

            if in_flight.is_empty() {
                let idle_for = self.last_enqueue.lock().elapsed();
                let remaining = self.options.idle_grace.saturating_sub(idle_for);
                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    () = self.wake.notified() => {}
                    () = tokio::time::sleep(remaining) => {
                        if self.try_park() {
                            info!("Engine idle, processing loop parked");
                            return;
                        }
                    }
                }
            } else {
                let has_capacity = in_flight.len() < self.options.concurrency;
                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    Some(joined) = in_flight.join_next() => {
                        if let Err(e) = joined {
                            if e.is_panic() {
                                error!("Page task panicked: {}", e);
                            } else {
                                warn!("Page task aborted: {}", e);
                            }
                        }
                    }
                    () = self.wake.notified(), if has_capacity => {}
                }
            }
        }

        // Aborted tasks resolve their callers through the handler's guard
        in_flight.abort_all();
        while in_flight.join_next().await.is_some() {}
        self.state.lock().is_running = false;
        debug!("Engine processing loop cancelled");
    }

    /// Mark the loop stopped if it is still idle; `false` means keep going
    fn try_park(&self) -> bool {
        let mut state = self.state.lock();
        let queue = self.queue.lock();
        if !queue.is_empty() {
            return false;
        }
        if self.last_enqueue.lock().elapsed() < self.options.idle_grace {
            return false;
        }
        state.is_running = false;
        state.loop_handle = None;
        true
    }

    /// Tear the engine down
    ///
    /// Pending units resolve with `engine_unavailable`, in-flight pages are
    /// aborted and later enqueues are rejected.
    pub async fn shutdown(&self) {
        let drained: Vec<PageWorkUnit> = {
            let mut queue = self.queue.lock();
            self.torn_down.store(true, Ordering::Release);
            queue.drain(..).collect()
        };

        if !drained.is_empty() {
            info!(pending = drained.len(), "Abandoning queued pages on shutdown");
        }
        let err = ScrapeError::EngineFatal("Engine shut down before the page was processed".to_string());
        for unit in drained {
            self.handler.abandon(&unit, &err);
        }

        self.cancel.cancel();
        let handle = self.state.lock().loop_handle.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!("Engine loop ended abnormally: {}", e);
        }

        if let Err(e) = self.engine.shutdown().await {
            warn!("Engine shutdown failed: {:#}", e);
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().is_running
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// How many processing loops were started over the manager's lifetime
    #[must_use]
    pub fn loops_started(&self) -> usize {
        self.loops_started.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}
