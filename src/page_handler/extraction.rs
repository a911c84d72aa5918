//! Field extraction with per-field fallback selector chains

use tracing::debug;

use crate::engine::{PageSnapshot, SnapshotDocument};
use crate::types::{FieldMap, SelectorConfig};

/// Built-in fallbacks for well-known fields, tried in order
pub const FALLBACK_SELECTORS: &[(&str, &[&str])] = &[
    (
        "title",
        &[
            "h1",
            ".article-title",
            ".entry-title",
            ".post-title",
            "[itemprop='headline']",
            "meta[property='og:title']",
        ],
    ),
    (
        "content",
        &[
            "article",
            "main",
            ".article-body",
            ".entry-content",
            ".post-content",
            "[role='main']",
            "[itemprop='articleBody']",
        ],
    ),
    (
        "author",
        &[
            ".author",
            ".author-name",
            "[rel='author']",
            "[itemprop='author']",
            "meta[name='author']",
        ],
    ),
    (
        "date",
        &[
            "time",
            ".published-date",
            ".post-date",
            "[itemprop='datePublished']",
            "meta[property='article:published_time']",
        ],
    ),
    (
        "description",
        &[
            ".excerpt",
            ".description",
            ".summary",
            "meta[name='description']",
            "meta[property='og:description']",
        ],
    ),
];

/// Fallback chain for `field`, matched case-insensitively; empty when unknown
#[must_use]
pub fn fallback_chain(field: &str) -> &'static [&'static str] {
    FALLBACK_SELECTORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(field))
        .map(|(_, chain)| *chain)
        .unwrap_or(&[])
}

/// Raw value for `selector`: `content` for meta tags, `textContent` otherwise
fn lookup(document: &SnapshotDocument, selector: &str) -> Result<Option<String>, String> {
    if selector.trim_start().starts_with("meta") {
        document.first_attribute(selector, "content")
    } else {
        document.first_text(selector)
    }
}

/// Extract every configured field from `snapshot`
///
/// The caller's selector is tried first; an absent or empty value falls
/// through the field's fallback chain. Unmatched fields map to `""`. With
/// no selectors at all, `title` and `content` are extracted when present.
pub fn extract_fields(snapshot: &PageSnapshot, selectors: &SelectorConfig) -> FieldMap {
    let document = snapshot.document();
    let mut data = FieldMap::new();

    if selectors.is_empty() {
        for (field, selector) in [("title", "h1"), ("content", "article, main")] {
            if let Ok(Some(value)) = document.first_text(selector) {
                data.insert(field, value.trim());
            }
        }
        return data;
    }

    for (field, spec) in selectors.iter() {
        let mut value = match lookup(&document, spec.as_css()) {
            Ok(found) => found,
            Err(e) => {
                debug!("Failed to extract {} with provided selector: {}", field, e);
                None
            }
        };

        if value.as_deref().is_none_or(str::is_empty) {
            for fallback in fallback_chain(field) {
                if let Ok(Some(found)) = lookup(&document, fallback)
                    && !found.is_empty()
                {
                    debug!("Extracted {} using fallback: {}", field, fallback);
                    value = Some(found);
                    break;
                }
            }
        }

        data.insert(field, value.unwrap_or_default().trim());
    }

    data
}
