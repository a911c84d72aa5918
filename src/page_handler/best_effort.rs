//! Outcome of an operation whose failures are swallowed, not propagated

use tracing::debug;

/// A value plus notes on whatever went wrong while producing it
///
/// Best-effort passes (popup dismissal, captcha scanning) never fail the
/// page. Their failures are kept here so the handler can log them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BestEffort<T> {
    pub value: T,
    pub failures: Vec<String>,
}

impl<T> BestEffort<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            failures: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, failure: impl Into<String>) {
        self.failures.push(failure.into());
    }

    /// Log swallowed failures at debug level and return the value
    pub fn into_logged(self, correlation_id: &str, capability: &str) -> T {
        for failure in &self.failures {
            debug!("[{}] {} ignored failure: {}", correlation_id, capability, failure);
        }
        self.value
    }
}
