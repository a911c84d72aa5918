//! Retry with exponential backoff for navigation

use anyhow::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Classify errors into retryable vs permanent failures
///
/// Browser, page or connection loss is permanent; timeouts, network
/// failures and anything unrecognised are retried.
#[must_use]
pub fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_str = format!("{error:#}").to_lowercase();

    let permanent = error_str.contains("browser closed")
        || error_str.contains("browser disconnected")
        || error_str.contains("page closed")
        || error_str.contains("target closed")
        || error_str.contains("session not found")
        || error_str.contains("session closed")
        || error_str.contains("no response from the chromium instance")
        || error_str.contains("channel")
        || (error_str.contains("frame") && error_str.contains("not found"))
        || error_str.contains("websocket")
        || error_str.contains("shut down");

    !permanent
}

/// Run `f` up to `max_retries + 1` times, sleeping `2^n s + jitter` between attempts
///
/// Non-retryable errors fail immediately.
pub async fn retry_with_backoff<F, Fut, T>(f: F, max_retries: u32) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable_error(&e) {
                    warn!("Non-retryable error encountered, failing fast: {:#}", e);
                    return Err(e);
                }

                if retries >= max_retries {
                    return Err(e);
                }

                let delay = 2u64.pow(retries) * 1000 + rand::rng().random_range(0..1000);
                warn!(
                    "Retryable error, attempt {}/{}, retrying in {}ms: {:#}",
                    retries + 1,
                    max_retries,
                    delay,
                    e
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                retries += 1;
            }
        }
    }
}
