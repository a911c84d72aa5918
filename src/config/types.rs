//! Core configuration type for the scrape service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::constants::{
    DEFAULT_CRAWL_CONCURRENCY, DEFAULT_ENGINE_IDLE_GRACE_MS, DEFAULT_LATE_RESULT_GRACE_MS,
    DEFAULT_NAVIGATION_RETRIES, DEFAULT_NAVIGATION_TIMEOUT_SECS, DEFAULT_PORT,
    DEFAULT_RESULT_TTL_SECS, DEFAULT_TIMEOUT_MS,
};

/// Runtime settings for the HTTP surface, the engine loop and the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// `DEBUG`, `INFO`, `WARNING`, `ERROR` or `CRITICAL` (any case)
    pub(crate) log_level: String,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) headless: bool,
    pub(crate) enable_stealth: bool,
    pub(crate) crawl_concurrency: usize,
    pub(crate) default_timeout_ms: u64,
    /// Quiet period before the processing loop exits
    pub(crate) engine_idle_grace_ms: u64,
    pub(crate) navigation_timeout_secs: u64,
    pub(crate) navigation_retries: u32,
    /// How long a timed-out request's late result is awaited before eviction
    pub(crate) late_result_grace_ms: u64,
    pub(crate) result_ttl_secs: u64,
    pub(crate) chromium_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            headless: true,
            enable_stealth: true,
            crawl_concurrency: DEFAULT_CRAWL_CONCURRENCY,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            engine_idle_grace_ms: DEFAULT_ENGINE_IDLE_GRACE_MS,
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
            navigation_retries: DEFAULT_NAVIGATION_RETRIES,
            late_result_grace_ms: DEFAULT_LATE_RESULT_GRACE_MS,
            result_ttl_secs: DEFAULT_RESULT_TTL_SECS,
            chromium_path: None,
        }
    }
}
