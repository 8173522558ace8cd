use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title placeholder for an item or entry without a usable title.
pub const UNTITLED: &str = "Untitled";

/// Feed title placeholder when the document has no channel/feed title.
pub const UNKNOWN_FEED: &str = "Unknown Feed";

/// Feed title marker carried by a [`FeedResult`] whose refresh failed.
pub const ERROR_TITLE: &str = "Error";

/// A single RSS `<item>` or Atom `<entry>`, reduced to the fields we display.
///
/// Every field is always present. Data missing from the source document is an
/// empty string, so consumers never have to distinguish "absent" from "empty".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// Date text exactly as it appeared in the document (unparsed).
    pub published_at: String,
    pub content: String,
    /// Description/summary text, at most 200 characters.
    pub summary: String,
}

/// Outcome of one feed refresh.
///
/// A fresh value is built on every refresh; the caller stores it keyed by
/// `source_id`, replacing whatever it had before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResult {
    pub source_id: String,
    pub title: String,
    /// Newest first, at most ten entries. Empty when the refresh failed.
    pub items: Vec<FeedItem>,
    pub fetched_at: DateTime<Utc>,
    /// Set only when the refresh could not produce items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl FeedResult {
    pub fn success(source_id: &str, title: String, items: Vec<FeedItem>) -> Self {
        Self {
            source_id: source_id.to_owned(),
            title,
            items,
            fetched_at: Utc::now(),
            error_message: None,
        }
    }

    pub fn failure(source_id: &str, message: String) -> Self {
        Self {
            source_id: source_id.to_owned(),
            title: ERROR_TITLE.to_owned(),
            items: Vec::new(),
            fetched_at: Utc::now(),
            error_message: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}
