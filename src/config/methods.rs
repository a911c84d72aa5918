//! Validation and derived settings for `ServiceConfig`

use std::time::Duration;

use super::types::ServiceConfig;
use crate::engine::{EngineOptions, LoopOptions, StealthProfile};
use crate::service::ServiceTimeouts;
use crate::utils::constants::MAX_TIMEOUT_MS;

impl ServiceConfig {
    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.crawl_concurrency == 0 {
            return Err("CRAWL_CONCURRENCY must be at least 1".to_string());
        }
        if self.default_timeout_ms == 0 || self.default_timeout_ms > MAX_TIMEOUT_MS {
            return Err(format!("DEFAULT_TIMEOUT_MS must be between 1 and {MAX_TIMEOUT_MS}"));
        }
        if self.engine_idle_grace_ms == 0 {
            return Err("ENGINE_IDLE_GRACE_MS must be greater than 0".to_string());
        }
        if self.navigation_timeout_secs == 0 {
            return Err("NAVIGATION_TIMEOUT_SECS must be greater than 0".to_string());
        }
        if self.result_ttl_secs == 0 {
            return Err("RESULT_TTL_SECS must be greater than 0".to_string());
        }
        if self.host.trim().is_empty() {
            return Err("HOST must not be empty".to_string());
        }
        Ok(())
    }

    /// `EnvFilter` directive for `LOG_LEVEL`
    ///
    /// Unknown levels fall back to `info`.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.log_level.trim().to_ascii_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARNING" | "WARN" => "warn",
            "ERROR" | "CRITICAL" => "error",
            _ => "info",
        }
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            headless: self.headless,
            enable_stealth: self.enable_stealth,
            chromium_path: self.chromium_path.clone(),
            navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
            navigation_retries: self.navigation_retries,
            stealth: StealthProfile::default(),
        }
    }

    #[must_use]
    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            concurrency: self.crawl_concurrency,
            idle_grace: Duration::from_millis(self.engine_idle_grace_ms),
        }
    }

    #[must_use]
    pub fn service_timeouts(&self) -> ServiceTimeouts {
        ServiceTimeouts {
            default_timeout: Duration::from_millis(self.default_timeout_ms),
            late_result_grace: Duration::from_millis(self.late_result_grace_ms),
        }
    }

    #[must_use]
    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    #[must_use]
    pub fn with_crawl_concurrency(mut self, concurrency: usize) -> Self {
        self.crawl_concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_engine_idle_grace_ms(mut self, grace_ms: u64) -> Self {
        self.engine_idle_grace_ms = grace_ms;
        self
    }

    #[must_use]
    pub fn with_late_result_grace_ms(mut self, grace_ms: u64) -> Self {
        self.late_result_grace_ms = grace_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_map_to_tracing_directives() {
        let mut config = ServiceConfig::default();
        for (level, directive) in [
            ("INFO", "info"),
            ("warning", "warn"),
            ("CRITICAL", "error"),
            ("Debug", "debug"),
            ("verbose", "info"),
        ] {
            config.log_level = level.to_string();
            assert_eq!(config.log_filter(), directive, "{level}");
        }
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = ServiceConfig {
            crawl_concurrency: 0,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ServiceConfig::default().validate().is_ok());
    }
}
