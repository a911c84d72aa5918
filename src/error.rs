//! Error taxonomy for scrape requests
//!
//! Every failure a caller can observe maps to one stable [`ErrorKind`] (the
//! `error_type` field on the wire) and one HTTP status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error types for scrape operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScrapeError {
    /// Malformed URL, selectors or timeout; rejected before enqueue
    #[error("{0}")]
    Validation(String),

    /// The page served a captcha or bot challenge instead of content
    #[error("CAPTCHA detected on page")]
    CaptchaBlocked,

    /// Unexpected failure inside the page pipeline
    #[error("{0}")]
    Scraping(String),

    /// The caller's deadline elapsed before the page work resolved
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The shared engine cannot be constructed or has been torn down
    #[error("Browser engine unavailable: {0}")]
    EngineFatal(String),

    /// A correlation id was registered twice
    #[error("Correlation id already registered: {0}")]
    DuplicateId(String),
}

impl From<anyhow::Error> for ScrapeError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the full context chain
        Self::Scraping(format!("{err:#}"))
    }
}

impl ScrapeError {
    /// Stable classification reported as `error_type`
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::CaptchaBlocked => ErrorKind::CaptchaDetected,
            Self::Scraping(_) | Self::DuplicateId(_) => ErrorKind::ScrapingError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::EngineFatal(_) => ErrorKind::EngineUnavailable,
        }
    }

    /// HTTP status reported for this error
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.kind().status()
    }
}

/// Machine-readable failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    CaptchaDetected,
    ScrapingError,
    Timeout,
    EngineUnavailable,
}

impl ErrorKind {
    /// HTTP status code for this kind
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::ValidationError | Self::CaptchaDetected => 422,
            Self::ScrapingError => 500,
            Self::Timeout => 408,
            Self::EngineUnavailable => 503,
        }
    }

    /// Wire name, identical to the serde representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::CaptchaDetected => "captcha_detected",
            Self::ScrapingError => "scraping_error",
            Self::Timeout => "timeout",
            Self::EngineUnavailable => "engine_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_kind() {
        assert_eq!(ScrapeError::Validation("bad".into()).status(), 422);
        assert_eq!(ScrapeError::CaptchaBlocked.status(), 422);
        assert_eq!(ScrapeError::Scraping("boom".into()).status(), 500);
        assert_eq!(ScrapeError::Timeout { timeout_ms: 100 }.status(), 408);
        assert_eq!(ScrapeError::EngineFatal("gone".into()).status(), 503);
        assert_eq!(ScrapeError::DuplicateId("x".into()).status(), 500);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::CaptchaDetected).unwrap();
        assert_eq!(json, "\"captcha_detected\"");
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
    }
}
