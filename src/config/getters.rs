//! Getter methods for `ServiceConfig`

use std::path::Path;

use super::types::ServiceConfig;

impl ServiceConfig {
    #[must_use]
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn enable_stealth(&self) -> bool {
        self.enable_stealth
    }

    #[must_use]
    pub fn crawl_concurrency(&self) -> usize {
        self.crawl_concurrency
    }

    #[must_use]
    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms
    }

    #[must_use]
    pub fn engine_idle_grace_ms(&self) -> u64 {
        self.engine_idle_grace_ms
    }

    #[must_use]
    pub fn navigation_timeout_secs(&self) -> u64 {
        self.navigation_timeout_secs
    }

    #[must_use]
    pub fn navigation_retries(&self) -> u32 {
        self.navigation_retries
    }

    #[must_use]
    pub fn late_result_grace_ms(&self) -> u64 {
        self.late_result_grace_ms
    }

    #[must_use]
    pub fn result_ttl_secs(&self) -> u64 {
        self.result_ttl_secs
    }

    #[must_use]
    pub fn chromium_path(&self) -> Option<&Path> {
        self.chromium_path.as_deref()
    }
}
