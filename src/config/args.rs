//! Command-line and environment arguments

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use super::types::ServiceConfig;
use crate::utils::constants::{
    DEFAULT_CRAWL_CONCURRENCY, DEFAULT_ENGINE_IDLE_GRACE_MS, DEFAULT_LATE_RESULT_GRACE_MS,
    DEFAULT_NAVIGATION_RETRIES, DEFAULT_NAVIGATION_TIMEOUT_SECS, DEFAULT_PORT,
    DEFAULT_RESULT_TTL_SECS, DEFAULT_TIMEOUT_MS,
};

/// Browser-backed scraping service
#[derive(Parser, Debug, Clone)]
#[command(name = "scrape-relay", version, about)]
pub struct ServiceArgs {
    /// DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Run the browser without a window
    #[arg(
        long,
        env = "PLAYWRIGHT_HEADLESS",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub headless: bool,

    /// Apply fingerprint evasions to every page
    #[arg(
        long,
        env = "ENABLE_STEALTH",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub enable_stealth: bool,

    /// Pages processed in parallel
    #[arg(long, env = "CRAWL_CONCURRENCY", default_value_t = DEFAULT_CRAWL_CONCURRENCY)]
    pub crawl_concurrency: usize,

    /// Deadline for requests that do not set `timeout_ms`
    #[arg(long, env = "DEFAULT_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub default_timeout_ms: u64,

    #[arg(long, env = "ENGINE_IDLE_GRACE_MS", default_value_t = DEFAULT_ENGINE_IDLE_GRACE_MS)]
    pub engine_idle_grace_ms: u64,

    #[arg(long, env = "NAVIGATION_TIMEOUT_SECS", default_value_t = DEFAULT_NAVIGATION_TIMEOUT_SECS)]
    pub navigation_timeout_secs: u64,

    #[arg(long, env = "NAVIGATION_RETRIES", default_value_t = DEFAULT_NAVIGATION_RETRIES)]
    pub navigation_retries: u32,

    #[arg(long, env = "LATE_RESULT_GRACE_MS", default_value_t = DEFAULT_LATE_RESULT_GRACE_MS)]
    pub late_result_grace_ms: u64,

    #[arg(long, env = "RESULT_TTL_SECS", default_value_t = DEFAULT_RESULT_TTL_SECS)]
    pub result_ttl_secs: u64,

    /// Browser binary to use instead of searching for one
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<PathBuf>,
}

impl ServiceArgs {
    /// Build and validate the service configuration
    pub fn into_config(self) -> Result<ServiceConfig, String> {
        let config = ServiceConfig {
            log_level: self.log_level,
            host: self.host,
            port: self.port,
            headless: self.headless,
            enable_stealth: self.enable_stealth,
            crawl_concurrency: self.crawl_concurrency,
            default_timeout_ms: self.default_timeout_ms,
            engine_idle_grace_ms: self.engine_idle_grace_ms,
            navigation_timeout_secs: self.navigation_timeout_secs,
            navigation_retries: self.navigation_retries,
            late_result_grace_ms: self.late_result_grace_ms,
            result_ttl_secs: self.result_ttl_secs,
            chromium_path: self.chromium_path.filter(|p| !p.as_os_str().is_empty()),
        };
        config.validate()?;
        Ok(config)
    }
}
