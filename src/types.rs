//! Request, work-unit and result types shared by the service, the engine loop
//! and the HTTP surface.

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::ops::Index;
use std::time::Duration;

use crate::error::{ErrorKind, ScrapeError};

/// How to locate one field on a page
///
/// Closed set of selector kinds; serialized externally tagged, so a CSS
/// selector is `{"css": "h1"}` and any other key is rejected during
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorSpec {
    Css(String),
}

impl SelectorSpec {
    /// Build a CSS selector spec
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// The CSS selector text
    #[must_use]
    pub fn as_css(&self) -> &str {
        match self {
            Self::Css(css) => css,
        }
    }
}

/// Ordered mapping of field name to selector
///
/// Preserves the order in which the caller listed fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorConfig {
    fields: Vec<(String, SelectorSpec)>,
}

impl SelectorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing an existing entry with the same name in place
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, spec: SelectorSpec) -> Self {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = spec,
            None => self.fields.push((field, spec)),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SelectorSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reject blank field names and blank selectors
    pub fn validate(&self) -> Result<(), ScrapeError> {
        for (name, spec) in &self.fields {
            if name.trim().is_empty() {
                return Err(ScrapeError::Validation(
                    "Selector field names must be non-empty".to_string(),
                ));
            }
            if spec.as_css().trim().is_empty() {
                return Err(ScrapeError::Validation(format!(
                    "Selector for field '{name}' must be a non-empty CSS selector"
                )));
            }
        }
        Ok(())
    }
}

impl Serialize for SelectorConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, spec) in &self.fields {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SelectorConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SelectorConfigVisitor;

        impl<'de> Visitor<'de> for SelectorConfigVisitor {
            type Value = SelectorConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to selector objects like {\"css\": \"h1\"}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                let mut seen = HashSet::new();
                while let Some((name, spec)) = access.next_entry::<String, SelectorSpec>()? {
                    if !seen.insert(name.clone()) {
                        return Err(de::Error::custom(format!("duplicate selector field '{name}'")));
                    }
                    fields.push((name, spec));
                }
                Ok(SelectorConfig { fields })
            }
        }

        deserializer.deserialize_map(SelectorConfigVisitor)
    }
}

/// Extracted field values in the order the fields were requested
///
/// Serialized as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field`, replacing an existing value in place
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn contains_key(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<&str> for FieldMap {
    type Output = String;

    /// Panics when `field` is absent, like `HashMap` indexing
    fn index(&self, field: &str) -> &String {
        match self.entries.iter().find(|(name, _)| name == field) {
            Some((_, value)) => value,
            None => panic!("no extracted field named '{field}'"),
        }
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldMapVisitor;

        impl<'de> Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to extracted strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fields = FieldMap::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    fields.insert(name, value);
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

/// Body of `POST /scrape`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(default)]
    pub selectors: Option<SelectorConfig>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selectors: None,
            timeout_ms: None,
        }
    }

    #[must_use]
    pub fn with_selectors(mut self, selectors: SelectorConfig) -> Self {
        self.selectors = Some(selectors);
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// One page to process: immutable once enqueued, consumed exactly once
#[derive(Debug, Clone)]
pub struct PageWorkUnit {
    pub correlation_id: String,
    pub url: String,
    pub selectors: SelectorConfig,
}

/// Outcome metadata attached to every result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeMeta {
    pub status: u16,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Structured result for one scrape, success or failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub data: FieldMap,
    pub meta: ScrapeMeta,
}

impl ScrapeResult {
    /// Successful extraction
    pub fn success(url: impl Into<String>, data: FieldMap, elapsed: Duration) -> Self {
        Self {
            url: url.into(),
            data,
            meta: ScrapeMeta {
                status: 200,
                duration_ms: duration_ms(elapsed),
                error_type: None,
                error_message: None,
            },
        }
    }

    /// Failure result carrying the error's kind, status and message
    pub fn failure(url: impl Into<String>, error: &ScrapeError, elapsed: Duration) -> Self {
        Self {
            url: url.into(),
            data: FieldMap::new(),
            meta: ScrapeMeta {
                status: error.status(),
                duration_ms: duration_ms(elapsed),
                error_type: Some(error.kind()),
                error_message: Some(error.to_string()),
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.meta.error_type.is_none()
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.meta.error_type
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_config_keeps_request_order() {
        let json = r#"{"title": {"css": "h1"}, "author": {"css": ".byline"}, "body": {"css": "article"}}"#;
        let config: SelectorConfig = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = config.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["title", "author", "body"]);
    }

    #[test]
    fn unknown_selector_kind_is_rejected() {
        let json = r#"{"title": {"xpath": "//h1"}}"#;
        assert!(serde_json::from_str::<SelectorConfig>(json).is_err());
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let json = r#"{"title": {"css": "h1"}, "title": {"css": "h2"}}"#;
        assert!(serde_json::from_str::<SelectorConfig>(json).is_err());
    }

    #[test]
    fn blank_selector_fails_validation() {
        let config = SelectorConfig::new().with("title", SelectorSpec::css("  "));
        assert!(matches!(config.validate(), Err(ScrapeError::Validation(_))));
    }

    #[test]
    fn failure_result_omits_nothing_the_wire_needs() {
        let result = ScrapeResult::failure(
            "https://example.com",
            &ScrapeError::CaptchaBlocked,
            Duration::from_millis(12),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["meta"]["status"], 422);
        assert_eq!(value["meta"]["duration_ms"], 12);
        assert_eq!(value["meta"]["error_type"], "captcha_detected");
        assert_eq!(value["data"], serde_json::json!({}));
    }

    #[test]
    fn success_result_has_no_error_fields() {
        let result = ScrapeResult::success("https://example.com", FieldMap::new(), Duration::ZERO);
        let value = serde_json::to_value(&result).unwrap();
        assert!(value["meta"].get("error_type").is_none());
        assert!(result.is_success());
    }

    #[test]
    fn field_map_serializes_in_insertion_order() {
        let mut data = FieldMap::new();
        data.insert("title", "T");
        data.insert("author", "A");
        data.insert("body", "B");
        data.insert("author", "A2");

        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"title":"T","author":"A2","body":"B"}"#);
        assert_eq!(data["author"], "A2");

        let back: FieldMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["title", "author", "body"]);
    }
}
