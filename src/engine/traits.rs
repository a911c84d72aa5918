//! Boundary between the orchestration layer and the browser
//!
//! The page pipeline only ever talks to these traits; [`ChromiumEngine`]
//! is the production implementation.
//!
//! [`ChromiumEngine`]: super::browser::ChromiumEngine

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::snapshot::PageSnapshot;

/// The one shared automation engine
#[async_trait]
pub trait BrowserEngine: Send + Sync + 'static {
    /// Open `url` in a fresh page
    ///
    /// Stealth evasions (when enabled) are applied before navigation. The
    /// engine owns navigation timeouts and navigation retries.
    async fn open_page(&self, url: &str) -> Result<Box<dyn LivePage>>;

    /// Release the engine's resources; safe to call more than once
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// One open page/tab
///
/// Interaction methods report "nothing matched" as `Ok(false)`/`Ok(0)`; an
/// `Err` means the page itself could not be talked to.
#[async_trait]
pub trait LivePage: Send + Sync {
    /// Wait until the document reached "DOM content loaded"
    async fn wait_for_content_loaded(&self) -> Result<()>;

    /// Click the first `<button>` whose text contains `text`, case-insensitively
    async fn click_button_with_text(&self, text: &str) -> Result<bool>;

    /// Click the first element matching `selector`
    async fn click_first(&self, selector: &str) -> Result<bool>;

    /// Remove every element matching `selector`, returning how many went
    async fn remove_all(&self, selector: &str) -> Result<usize>;

    /// Let the page react to an interaction
    async fn settle(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Serialize the current DOM
    async fn snapshot(&self) -> Result<PageSnapshot>;

    /// Close the page; closing twice is a no-op
    async fn close(&self);
}
