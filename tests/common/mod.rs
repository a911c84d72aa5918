//! Test utilities: a scripted in-memory browser engine and wiring helpers

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use scrape_relay::correlation::{RequestCorrelator, ResultStore};
use scrape_relay::engine::{BrowserEngine, EngineLifecycleManager, LivePage, LoopOptions, PageSnapshot};
use scrape_relay::page_handler::PageHandler;
use scrape_relay::types::{PageWorkUnit, SelectorConfig};

/// How the fake engine serves one URL
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum PageScript {
    /// Serve the HTML immediately
    Html(String),
    /// Serve the HTML after a delay spent "loading"
    Slow(Duration, String),
    /// Fail while opening the page
    FailOpen(String),
    /// Panic while opening the page
    Panic,
}

/// Scripted [`BrowserEngine`]; unknown URLs get a plain article page
#[derive(Default)]
pub struct FakeEngine {
    scripts: Mutex<HashMap<String, PageScript>>,
    opened: AtomicUsize,
    opened_urls: Mutex<Vec<String>>,
    closed: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
    shut_down: AtomicBool,
}

#[allow(dead_code)]
impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, script: PageScript) {
        self.scripts.lock().insert(url.to_string(), script);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// URLs in the order pages were opened
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened_urls.lock().clone()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// Releases the in-flight slot even when the opening future is dropped
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn open_page(&self, url: &str) -> Result<Box<dyn LivePage>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.opened_urls.lock().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let slot = InFlight(Arc::clone(&self.in_flight));

        let script = self
            .scripts
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| PageScript::Html(article_html("Example Domain", "Example body")));

        let html = match script {
            PageScript::Html(html) => html,
            PageScript::Slow(delay, html) => {
                tokio::time::sleep(delay).await;
                html
            }
            PageScript::FailOpen(message) => return Err(anyhow::anyhow!(message)),
            PageScript::Panic => panic!("scripted page panic for {url}"),
        };

        Ok(Box::new(FakePage {
            url: url.to_string(),
            html,
            closed: Arc::clone(&self.closed),
            is_closed: AtomicBool::new(false),
            _slot: slot,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakePage {
    url: String,
    html: String,
    closed: Arc<AtomicUsize>,
    is_closed: AtomicBool,
    _slot: InFlight,
}

#[async_trait]
impl LivePage for FakePage {
    async fn wait_for_content_loaded(&self) -> Result<()> {
        Ok(())
    }

    async fn click_button_with_text(&self, _text: &str) -> Result<bool> {
        Ok(false)
    }

    async fn click_first(&self, _selector: &str) -> Result<bool> {
        Ok(false)
    }

    async fn remove_all(&self, _selector: &str) -> Result<usize> {
        Ok(0)
    }

    async fn settle(&self, _duration: Duration) {}

    async fn snapshot(&self) -> Result<PageSnapshot> {
        Ok(PageSnapshot::new(self.url.clone(), self.html.clone()))
    }

    async fn close(&self) {
        if !self.is_closed.swap(true, Ordering::SeqCst) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Minimal article page with an `<h1>` and an `<article>`
#[allow(dead_code)]
pub fn article_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{title}</title></head>
<body>
    <h1>{title}</h1>
    <article><p>{body}</p></article>
</body>
</html>"#
    )
}

/// Page that shows a reCAPTCHA widget instead of content
#[allow(dead_code)]
pub fn captcha_html() -> String {
    r#"<!DOCTYPE html>
<html><body>
    <h1>One more step</h1>
    <div class="g-recaptcha" data-sitekey="6Lc_test"></div>
</body></html>"#
        .to_string()
}

#[allow(dead_code)]
pub fn unit(id: &str, url: &str) -> PageWorkUnit {
    PageWorkUnit {
        correlation_id: id.to_string(),
        url: url.to_string(),
        selectors: SelectorConfig::new(),
    }
}

/// Registry, store and lifecycle manager wired around one engine
#[allow(dead_code)]
pub struct Harness {
    pub correlator: Arc<RequestCorrelator>,
    pub store: Arc<ResultStore>,
    pub lifecycle: Arc<EngineLifecycleManager>,
}

#[allow(dead_code)]
pub fn harness(engine: Arc<FakeEngine>, options: LoopOptions) -> Harness {
    let correlator = Arc::new(RequestCorrelator::new());
    let store = Arc::new(ResultStore::new());
    let engine: Arc<dyn BrowserEngine> = engine;
    let handler = Arc::new(PageHandler::new(
        Arc::clone(&engine),
        Arc::clone(&correlator),
        Arc::clone(&store),
    ));
    let lifecycle = EngineLifecycleManager::new(engine, handler, options);
    Harness {
        correlator,
        store,
        lifecycle,
    }
}
