//! Chromium-backed [`BrowserEngine`]
//!
//! One browser process is launched at boot and shared by every page. When
//! opening a page fails, the browser is health-checked through a CDP
//! `version()` call and relaunched if it died.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use super::retry::retry_with_backoff;
use super::snapshot::PageSnapshot;
use super::stealth::{self, StealthProfile};
use super::traits::{BrowserEngine, LivePage};
use crate::utils::constants::{
    CHROME_USER_AGENT, DEFAULT_NAVIGATION_RETRIES, DEFAULT_NAVIGATION_TIMEOUT_SECS, SERVICE_NAME,
};

/// Launch and navigation settings for [`ChromiumEngine`]
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub headless: bool,
    pub enable_stealth: bool,
    /// Explicit browser binary; searched for (then downloaded) when unset
    pub chromium_path: Option<PathBuf>,
    pub navigation_timeout: Duration,
    /// Extra navigation attempts after the first, for transient failures
    pub navigation_retries: u32,
    pub stealth: StealthProfile,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            headless: true,
            enable_stealth: true,
            chromium_path: None,
            navigation_timeout: Duration::from_secs(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            navigation_retries: DEFAULT_NAVIGATION_RETRIES,
            stealth: StealthProfile::default(),
        }
    }
}

/// Browser plus its CDP event-handler task
///
/// The handler must be aborted once the browser is gone or it keeps running.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    /// Close the process, wait for it to exit, then remove its profile
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.cleanup_temp_dir();
    }

    /// Remove the profile directory; only after the process released it
    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            debug!("Cleaning up browser profile: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up browser profile {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();
        if self.user_data_dir.is_some() {
            warn!("BrowserWrapper dropped without explicit close - removing profile in Drop");
            self.cleanup_temp_dir();
        }
    }
}

/// Locate a Chrome/Chromium binary
///
/// An explicit path wins when it exists; otherwise well-known install
/// locations are tried, then `which` on Unix.
pub fn find_browser_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            info!("Using configured browser: {}", path.display());
            return Ok(path.to_path_buf());
        }
        warn!("Configured CHROMIUM_PATH does not exist: {}", path.display());
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "~/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for candidate in candidates {
        let path = match candidate.strip_prefix("~/") {
            Some(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => continue,
            },
            None => PathBuf::from(candidate),
        };
        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    info!("Found browser using 'which': {}", found);
                    return Ok(PathBuf::from(found));
                }
            }
        }
    }

    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium into the user cache directory
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(SERVICE_NAME)
        .join("chromium");
    info!("Downloading managed Chromium into {}", cache_dir.display());

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!("Downloaded Chromium to: {}", revision.folder_path.display());
    Ok(revision.executable_path)
}

/// Launch a browser with a fresh, uniquely named profile
async fn launch_browser(options: &EngineOptions) -> Result<BrowserWrapper> {
    let chrome_path = match find_browser_executable(options.chromium_path.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            warn!("{}; falling back to managed download", e);
            download_managed_browser().await?
        }
    };

    let user_data_dir =
        std::env::temp_dir().join(format!("{SERVICE_NAME}_chrome_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&user_data_dir).context("Failed to create user data directory")?;

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(options.navigation_timeout)
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir.clone())
        .chrome_executable(chrome_path);

    builder = if options.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    builder = builder
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-setuid-sandbox")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-backgrounding-occluded-windows")
        .arg("--disable-breakpad")
        .arg("--disable-features=TranslateUI")
        .arg("--disable-hang-monitor")
        .arg("--disable-prompt-on-repost")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--hide-scrollbars")
        .arg("--mute-audio");

    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    info!(headless = options.headless, "Launching browser");
    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let message = e.to_string();
                // chromiumoxide cannot decode some newer CDP events; those are noise
                if message.contains("data did not match any variant of untagged enum Message")
                    || message.contains("Failed to deserialize WS response")
                {
                    trace!("Suppressed benign CDP serialization error: {}", message);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        debug!("Browser handler task completed");
    });

    Ok(BrowserWrapper::new(browser, handler_task, user_data_dir))
}

/// Production engine: one shared Chromium process
pub struct ChromiumEngine {
    options: EngineOptions,
    browser: RwLock<Option<BrowserWrapper>>,
}

impl ChromiumEngine {
    /// Launch the browser; failure here should abort service boot
    pub async fn launch(options: EngineOptions) -> Result<Self> {
        let wrapper = launch_browser(&options).await?;
        Ok(Self {
            options,
            browser: RwLock::new(Some(wrapper)),
        })
    }

    async fn new_blank_page(&self) -> Result<Page> {
        {
            let guard = self.browser.read().await;
            let wrapper = guard
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Browser engine has been shut down"))?;
            match wrapper.browser.new_page("about:blank").await {
                Ok(page) => return Ok(page),
                Err(e) => warn!("Failed to create page: {}. Checking browser health", e),
            }
        }

        let mut guard = self.browser.write().await;
        let healthy = match guard.as_ref() {
            Some(wrapper) => wrapper.browser.version().await.is_ok(),
            None => return Err(anyhow::anyhow!("Browser engine has been shut down")),
        };
        if !healthy {
            warn!("Browser health check failed, relaunching");
            if let Some(crashed) = guard.take() {
                crashed.close().await;
            }
            *guard = Some(launch_browser(&self.options).await?);
        }

        let wrapper = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Browser engine has been shut down"))?;
        wrapper
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to create blank page")
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_page(&self, url: &str) -> Result<Box<dyn LivePage>> {
        let page = self.new_blank_page().await?;

        // Must run on about:blank so the scripts apply to the real navigation
        if self.options.enable_stealth
            && let Err(e) = stealth::inject(&page, &self.options.stealth).await
        {
            warn!("Stealth injection failed, continuing without it: {:#}", e);
        }

        let timeout = self.options.navigation_timeout;
        let navigated = retry_with_backoff(
            || {
                let page = page.clone();
                async move {
                    match tokio::time::timeout(timeout, page.goto(url)).await {
                        Ok(Ok(_)) => Ok(()),
                        Ok(Err(e)) => Err(anyhow::Error::new(e).context(format!("Failed to navigate to {url}"))),
                        Err(_) => Err(anyhow::anyhow!(
                            "Navigation to {url} timed out after {}s",
                            timeout.as_secs()
                        )),
                    }
                }
            },
            self.options.navigation_retries,
        )
        .await;

        if let Err(e) = navigated {
            if let Err(close_err) = page.close().await {
                debug!("Failed to close page after navigation error: {}", close_err);
            }
            return Err(e);
        }

        Ok(Box::new(ChromiumPage::new(page, timeout)))
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(wrapper) = self.browser.write().await.take() {
            info!("Shutting down browser");
            wrapper.close().await;
        }
        Ok(())
    }
}

/// Live Chromium tab
pub struct ChromiumPage {
    page: Page,
    load_timeout: Duration,
    closed: AtomicBool,
}

impl ChromiumPage {
    fn new(page: Page, load_timeout: Duration) -> Self {
        Self {
            page,
            load_timeout,
            closed: AtomicBool::new(false),
        }
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        let result = self.page.evaluate(script).await?;
        Ok(result.into_value::<T>()?)
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl LivePage for ChromiumPage {
    async fn wait_for_content_loaded(&self) -> Result<()> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(100);

        loop {
            match self.eval::<String>("document.readyState".to_string()).await {
                Ok(state) if state == "interactive" || state == "complete" => {
                    debug!("DOM content loaded after {:.2}s", start.elapsed().as_secs_f64());
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => debug!("Failed to check readyState: {}, retrying", e),
            }

            if start.elapsed() >= self.load_timeout {
                return Err(anyhow::anyhow!(
                    "Timed out after {}s waiting for DOM content loaded",
                    self.load_timeout.as_secs()
                ));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn click_button_with_text(&self, text: &str) -> Result<bool> {
        let script = format!(
            r"(() => {{
                const needle = {}.toLowerCase();
                for (const button of document.querySelectorAll('button')) {{
                    if ((button.textContent || '').toLowerCase().includes(needle)) {{
                        button.click();
                        return true;
                    }}
                }}
                return false;
            }})()",
            js_string(text)
        );
        self.eval(script).await
    }

    async fn click_first(&self, selector: &str) -> Result<bool> {
        let script = format!(
            r"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                el.click();
                return true;
            }})()",
            js_string(selector)
        );
        self.eval(script).await
    }

    async fn remove_all(&self, selector: &str) -> Result<usize> {
        let script = format!(
            r"(() => {{
                const nodes = document.querySelectorAll({});
                nodes.forEach(el => el.remove());
                return nodes.length;
            }})()",
            js_string(selector)
        );
        self.eval(script).await
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        let html = self.page.content().await.context("Failed to read page content")?;
        let url = self.page.url().await.ok().flatten().unwrap_or_default();
        Ok(PageSnapshot::new(url, html))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.page.clone().close().await {
            debug!("Failed to close page: {}", e);
        }
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Aborted pipelines never reach close(); finish it in the background
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let page = self.page.clone();
            runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!("Failed to close dropped page: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string("a'b\"c"), r#""a'b\"c""#);
        assert_eq!(js_string("[aria-label*='close' i]"), r#""[aria-label*='close' i]""#);
    }

    #[test]
    fn missing_explicit_path_falls_through_to_search() {
        let result = find_browser_executable(Some(Path::new("/definitely/not/a/browser")));
        if let Ok(path) = result {
            assert_ne!(path, PathBuf::from("/definitely/not/a/browser"));
        }
    }

    #[test]
    fn default_options_are_headless_with_stealth() {
        let options = EngineOptions::default();
        assert!(options.headless);
        assert!(options.enable_stealth);
        assert_eq!(options.navigation_retries, 1);
    }
}
