//! Raw notification events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A notification exactly as delivered by the host.
///
/// Created once per delivery and never mutated afterwards; the `with_*`
/// builders consume the event before it is shared.
///
/// # Example
///
/// ```rust
/// use notiledger::RawNotificationEvent;
///
/// let event = RawNotificationEvent::new("wallet.app", 1_700_000_000_000)
///     .with_title("Wallet")
///     .with_body("paid to CoffeeShop 28.50");
///
/// assert_eq!(event.combined_text(), "Wallet paid to CoffeeShop 28.50");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNotificationEvent {
    #[serde(alias = "packageName")]
    source_app: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "text")]
    body: Option<String>,
    #[serde(default)]
    extras: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    is_group_summary: bool,
    #[serde(alias = "postTime")]
    post_time_millis: i64,
    #[serde(default, alias = "notificationKey")]
    platform_key: String,
}

impl RawNotificationEvent {
    /// Creates an event with no text.
    #[must_use]
    pub fn new(source_app: impl Into<String>, post_time_millis: i64) -> Self {
        Self {
            source_app: source_app.into(),
            title: None,
            body: None,
            extras: BTreeMap::new(),
            is_group_summary: false,
            post_time_millis,
            platform_key: String::new(),
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the body text.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Marks the event as a group summary.
    #[must_use]
    pub const fn with_group_summary(mut self, is_group_summary: bool) -> Self {
        self.is_group_summary = is_group_summary;
        self
    }

    /// Sets the platform-assigned key.
    #[must_use]
    pub fn with_platform_key(mut self, key: impl Into<String>) -> Self {
        self.platform_key = key.into();
        self
    }

    /// Adds an extension attribute.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// Source application identifier.
    #[must_use]
    pub fn source_app(&self) -> &str {
        &self.source_app
    }

    /// Optional title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Optional body text.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Extension attributes.
    #[must_use]
    pub const fn extras(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extras
    }

    /// Whether the host flagged this as a group summary.
    #[must_use]
    pub const fn is_group_summary(&self) -> bool {
        self.is_group_summary
    }

    /// Arrival time in epoch millis.
    #[must_use]
    pub const fn post_time_millis(&self) -> i64 {
        self.post_time_millis
    }

    /// Platform-assigned dedup key.
    #[must_use]
    pub fn platform_key(&self) -> &str {
        &self.platform_key
    }

    /// Title and body joined by a single space, skipping missing or blank parts.
    #[must_use]
    pub fn combined_text(&self) -> String {
        [self.title.as_deref(), self.body.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Lowercased combined text for keyword matching.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        self.combined_text().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_text_skips_missing_parts() {
        let only_body = RawNotificationEvent::new("a", 0).with_body("  hello ");
        assert_eq!(only_body.combined_text(), "hello");

        let blank_title = RawNotificationEvent::new("a", 0)
            .with_title("   ")
            .with_body("hello");
        assert_eq!(blank_title.combined_text(), "hello");

        let empty = RawNotificationEvent::new("a", 0);
        assert_eq!(empty.combined_text(), "");
    }

    #[test]
    fn test_deserialize_inbound_shape() {
        let json = r#"{
            "sourceApp": "wallet.app",
            "title": "Wallet",
            "body": "paid to CoffeeShop 28.50",
            "isGroupSummary": false,
            "postTimeMillis": 1700000000000,
            "platformKey": "0|wallet.app|1"
        }"#;
        let event: RawNotificationEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.source_app(), "wallet.app");
        assert_eq!(event.post_time_millis(), 1_700_000_000_000);
        assert_eq!(event.platform_key(), "0|wallet.app|1");
        assert!(event.extras().is_empty());
    }

    #[test]
    fn test_deserialize_minimal_with_aliases() {
        let json = r#"{"packageName": "com.tencent.mm", "text": "微信支付", "postTime": 5}"#;
        let event: RawNotificationEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.source_app(), "com.tencent.mm");
        assert_eq!(event.body(), Some("微信支付"));
        assert!(event.title().is_none());
        assert!(!event.is_group_summary());
    }
}
