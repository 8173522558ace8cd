use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// A bookmarked job-search source: a plain link or an RSS/Atom feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSource {
    pub id: String,
    pub url: String,
    pub name: String,
    pub favicon: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_rss_feed: bool,
    #[serde(default)]
    pub is_favorite: bool,
    pub last_opened: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobSource {
    /// New source named after its domain, with a fresh UUID and no tags.
    pub fn new(url: &str, is_rss_feed: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.to_owned(),
            name: extract_domain(url),
            favicon: favicon_url(url),
            tags: Vec::new(),
            notes: String::new(),
            is_rss_feed,
            is_favorite: false,
            last_opened: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Adds tags not already present, keeping insertion order. Returns how many were added.
    pub fn add_tags<I, S>(&mut self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.tags.len();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() && !self.has_tag(tag) {
                self.tags.push(tag.to_owned());
            }
        }
        self.tags.len() - before
    }

    /// Removes the given tags. Returns how many were removed.
    pub fn remove_tags<I, S>(&mut self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.tags.len();
        let removed: Vec<S> = tags.into_iter().collect();
        self.tags
            .retain(|t| !removed.iter().any(|r| r.as_ref().trim() == t));
        before - self.tags.len()
    }
}

/// Checks that a source URL parses and uses http(s).
pub fn validate_source_url(url_str: &str) -> Result<Url, SourceError> {
    let url = Url::parse(url_str.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(SourceError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Host name without a leading `www.`; the input itself when it has no host.
pub fn extract_domain(url_str: &str) -> String {
    match Url::parse(url_str).ok().as_ref().and_then(Url::host_str) {
        Some(host) => host.strip_prefix("www.").unwrap_or(host).to_owned(),
        None => url_str.to_owned(),
    }
}

/// 64px favicon URL from Google's favicon service, or `""` for an unparseable URL.
pub fn favicon_url(url_str: &str) -> String {
    match Url::parse(url_str).ok().as_ref().and_then(Url::host_str) {
        Some(host) => format!("https://www.google.com/s2/favicons?domain={host}&sz=64"),
        None => String::new(),
    }
}
