//! Cookie banner and modal dismissal

use std::time::Duration;

use super::best_effort::BestEffort;
use crate::engine::LivePage;

/// Acceptance button texts, matched case-insensitively as substrings
pub const BUTTON_TEXTS: &[&str] = &[
    "Accept",
    "Accept all",
    "Agree",
    "OK",
    "Allow",
    "Got it",
    "I agree",
    "Continue",
    "Consent",
    "Allow all",
];

pub const CLOSE_SELECTORS: &[&str] = &[
    ".modal-close",
    ".popup-close",
    ".cookie-close",
    "[aria-label*='close' i]",
    "[aria-label*='dismiss' i]",
    ".close-button",
    "button.close",
    "[data-dismiss='modal']",
];

pub const BANNER_SELECTORS: &[&str] = &[
    "#cookie-banner",
    "#cookie-notice",
    ".cookie-notice",
    ".cookie-banner",
    ".gdpr-banner",
    ".consent-banner",
    "[data-testid*='cookie' i]",
    "[data-testid*='consent' i]",
];

const SETTLE_AFTER_CLICK: Duration = Duration::from_millis(500);

/// What the dismissal pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopupOutcome {
    pub clicked_button: Option<&'static str>,
    pub clicked_close: Option<&'static str>,
    pub removed_banners: usize,
}

/// Click at most one acceptance button and one close control, then remove
/// every known banner element
///
/// Failing interactions are recorded and skipped; this never fails.
pub async fn dismiss_popups(page: &dyn LivePage) -> BestEffort<PopupOutcome> {
    let mut outcome = BestEffort::new(PopupOutcome::default());

    for &text in BUTTON_TEXTS {
        match page.click_button_with_text(text).await {
            Ok(true) => {
                outcome.value.clicked_button = Some(text);
                page.settle(SETTLE_AFTER_CLICK).await;
                break;
            }
            Ok(false) => {}
            Err(e) => outcome.record_failure(format!("button '{text}': {e:#}")),
        }
    }

    for &selector in CLOSE_SELECTORS {
        match page.click_first(selector).await {
            Ok(true) => {
                outcome.value.clicked_close = Some(selector);
                page.settle(SETTLE_AFTER_CLICK).await;
                break;
            }
            Ok(false) => {}
            Err(e) => outcome.record_failure(format!("close '{selector}': {e:#}")),
        }
    }

    for &selector in BANNER_SELECTORS {
        match page.remove_all(selector).await {
            Ok(removed) => outcome.value.removed_banners += removed,
            Err(e) => outcome.record_failure(format!("banner '{selector}': {e:#}")),
        }
    }

    outcome
}
