//! Shared defaults for scrape_relay
//!
//! Default values and tuning constants used throughout the service so the
//! configuration layer, the engine loop, and the HTTP surface agree.

/// Default per-request deadline: 30 seconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Largest deadline a caller may request: 10 minutes
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Default number of pages the engine processes in parallel
pub const DEFAULT_CRAWL_CONCURRENCY: usize = 3;

/// How long the processing loop stays parked on an empty queue before exiting
pub const DEFAULT_ENGINE_IDLE_GRACE_MS: u64 = 5_000;

/// Timeout for `page.goto()` plus the DOM-content-loaded wait
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;

/// Navigation retries performed by the browser engine itself
pub const DEFAULT_NAVIGATION_RETRIES: u32 = 1;

/// How long a timed-out caller's reaper waits for the late result
pub const DEFAULT_LATE_RESULT_GRACE_MS: u64 = 60_000;

/// Results older than this are swept from the result store
pub const DEFAULT_RESULT_TTL_SECS: u64 = 300;

/// Interval between result store sweeps
pub const RESULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Chrome user agent string for stealth mode
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Service name reported by `GET /`
pub const SERVICE_NAME: &str = "scrape_relay";
