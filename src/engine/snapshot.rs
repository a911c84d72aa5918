//! Static DOM snapshots
//!
//! Extraction and captcha scanning run against a serialized copy of the DOM
//! taken once the page settled, parsed with `scraper`. Text values follow
//! DOM `textContent` semantics (all descendant text, scripts included).

use scraper::{ElementRef, Html, Selector};

/// Serialized DOM of one page
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    url: String,
    html: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Parse the snapshot for querying
    ///
    /// The parsed document is not `Send`; use it within one synchronous scope.
    #[must_use]
    pub fn document(&self) -> SnapshotDocument {
        SnapshotDocument {
            html: Html::parse_document(&self.html),
        }
    }
}

/// Parsed snapshot
pub struct SnapshotDocument {
    html: Html,
}

impl SnapshotDocument {
    /// `textContent` of the first element matching `selector`
    ///
    /// `Ok(None)` when nothing matches; `Err` when the selector is invalid.
    pub fn first_text(&self, selector: &str) -> Result<Option<String>, String> {
        let selector = parse_selector(selector)?;
        Ok(self.html.select(&selector).next().map(text_content))
    }

    /// Attribute value of the first element matching `selector`
    pub fn first_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>, String> {
        let selector = parse_selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr(attribute).map(ToString::to_string)))
    }

    /// Whether any element matches `selector`
    pub fn matches_any(&self, selector: &str) -> Result<bool, String> {
        let selector = parse_selector(selector)?;
        Ok(self.html.select(&selector).next().is_some())
    }

    /// `textContent` of `<body>`, empty when there is none
    #[must_use]
    pub fn body_text(&self) -> String {
        self.first_text("body").ok().flatten().unwrap_or_default()
    }

    /// `src` of every `<iframe>`
    #[must_use]
    pub fn iframe_sources(&self) -> Vec<String> {
        match parse_selector("iframe[src]") {
            Ok(selector) => self
                .html
                .select(&selector)
                .filter_map(|el| el.value().attr("src").map(ToString::to_string))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| format!("Invalid selector '{selector}': {e}"))
}

fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect()
}
