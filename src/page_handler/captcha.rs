//! Captcha and bot-challenge detection over a DOM snapshot

use std::fmt;

use super::best_effort::BestEffort;
use crate::engine::PageSnapshot;

pub const CAPTCHA_KEYWORDS: &[&str] = &[
    "captcha",
    "recaptcha",
    "hcaptcha",
    "verify you are human",
    "verify you're human",
    "security check",
    "prove you're not a robot",
    "cloudflare",
];

pub const CAPTCHA_FRAME_PATTERNS: &[&str] = &["google.com/recaptcha", "hcaptcha.com", "captcha", "recaptcha"];

pub const CAPTCHA_ELEMENT_SELECTORS: &[&str] = &[
    ".g-recaptcha",
    "#g-recaptcha",
    ".h-captcha",
    "#h-captcha",
    "[data-sitekey]",
    "iframe[src*='recaptcha']",
    "iframe[src*='hcaptcha']",
];

/// The first indicator that matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaSignal {
    Keyword(&'static str),
    /// Main-frame or iframe URL
    Frame(String),
    Element(&'static str),
}

impl fmt::Display for CaptchaSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(keyword) => write!(f, "keyword '{keyword}'"),
            Self::Frame(url) => write!(f, "frame {url}"),
            Self::Element(selector) => write!(f, "element {selector}"),
        }
    }
}

/// Scan body text, frame URLs and known widget elements, in that order
///
/// Frame URLs are the page's own URL (a redirect to a challenge page) plus
/// every iframe source.
///
/// `value` is `Some` on the first hit. Selector errors are recorded and
/// treated as "no match".
pub fn detect_captcha(snapshot: &PageSnapshot) -> BestEffort<Option<CaptchaSignal>> {
    let mut outcome = BestEffort::new(None);
    let document = snapshot.document();

    let body = document.body_text().to_lowercase();
    if let Some(&keyword) = CAPTCHA_KEYWORDS.iter().find(|k| body.contains(**k)) {
        outcome.value = Some(CaptchaSignal::Keyword(keyword));
        return outcome;
    }

    let frames = std::iter::once(snapshot.url().to_string()).chain(document.iframe_sources());
    for url in frames {
        let lowered = url.to_lowercase();
        if CAPTCHA_FRAME_PATTERNS.iter().any(|p| lowered.contains(p)) {
            outcome.value = Some(CaptchaSignal::Frame(url));
            return outcome;
        }
    }

    for &selector in CAPTCHA_ELEMENT_SELECTORS {
        match document.matches_any(selector) {
            Ok(true) => {
                outcome.value = Some(CaptchaSignal::Element(selector));
                return outcome;
            }
            Ok(false) => {}
            Err(e) => outcome.record_failure(e),
        }
    }

    outcome
}
