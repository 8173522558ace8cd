use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use futures::stream::{self, StreamExt};
use thiserror::Error;

use super::normalize::normalize_items;
use super::parser::{parse_feed, ParseError};
use super::relay::{FetchError, RelayFetcher};
use super::types::{FeedItem, FeedResult};

/// Maximum number of feeds refreshed at the same time by [`FeedRefresher::refresh_all`].
const MAX_CONCURRENT_REFRESHES: usize = 10;

/// Why a refresh produced an error result. Only ever seen as `error_message`.
#[derive(Debug, Error)]
enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Drives fetch → parse → normalize for one source and tracks which sources
/// are currently being refreshed.
///
/// Refreshes of different sources are independent. Two overlapping refreshes
/// of the *same* source are not serialized: the source stays in flight until
/// the last of them finishes, and whichever finishes last is the result the
/// caller ends up storing.
#[derive(Debug)]
pub struct FeedRefresher {
    fetcher: RelayFetcher,
    /// Number of refreshes currently running per source. Finished sources stay at 0.
    loading: Mutex<HashMap<String, usize>>,
}

impl FeedRefresher {
    pub fn new(fetcher: RelayFetcher) -> Self {
        Self {
            fetcher,
            loading: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetcher(&self) -> &RelayFetcher {
        &self.fetcher
    }

    /// Whether a refresh of `source_id` is in flight right now.
    pub fn is_loading(&self, source_id: &str) -> bool {
        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source_id)
            .is_some_and(|running| *running > 0)
    }

    /// Copy of the whole in-flight map, including sources that have finished.
    pub fn loading_snapshot(&self) -> HashMap<String, bool> {
        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, running)| (id.clone(), *running > 0))
            .collect()
    }

    /// Refreshes one feed: fetch through the relays, parse, then normalize.
    ///
    /// The source counts as loading (see [`FeedRefresher::is_loading`]) from
    /// the moment this is called until the returned future completes or is
    /// dropped.
    ///
    /// # Arguments
    ///
    /// * `source_id` - Caller's id for the source, copied into the result
    /// * `url` - Feed URL handed to every relay
    ///
    /// # Returns
    ///
    /// Never fails. On success the feed title and at most ten items, newest
    /// first. On any fetch or parse failure a [`FeedResult`] titled `"Error"`
    /// with no items and `error_message` set to the failure text (for example
    /// `"HTTP 502"` or `"Invalid RSS feed"`).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn demo() {
    /// use job_sources::feed::{default_relays, FeedRefresher, RelayFetcher};
    ///
    /// let refresher = FeedRefresher::new(RelayFetcher::new(reqwest::Client::new(), default_relays()));
    /// let result = refresher.refresh("rust-jobs", "https://jobs.example.com/feed.xml").await;
    /// match &result.error_message {
    ///     Some(err) => eprintln!("refresh failed: {err}"),
    ///     None => println!("{}: {} items", result.title, result.items.len()),
    /// }
    /// # }
    /// ```
    pub async fn refresh(&self, source_id: &str, url: &str) -> FeedResult {
        let _in_flight = InFlight::enter(&self.loading, source_id);

        match self.fetch_and_parse(url).await {
            Ok((title, items)) => {
                tracing::info!(
                    source_id = %source_id,
                    url = %url,
                    items = items.len(),
                    "Feed refreshed"
                );
                FeedResult::success(source_id, title, items)
            }
            Err(e) => {
                tracing::warn!(source_id = %source_id, url = %url, error = %e, "Feed refresh failed");
                FeedResult::failure(source_id, e.to_string())
            }
        }
    }

    /// Refreshes many `(source_id, url)` pairs, at most ten at a time.
    ///
    /// Results come back in completion order, not input order.
    pub async fn refresh_all<'a, I>(&self, sources: I) -> Vec<FeedResult>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        stream::iter(sources)
            .map(|(source_id, url)| self.refresh(source_id, url))
            .buffer_unordered(MAX_CONCURRENT_REFRESHES)
            .collect()
            .await
    }

    async fn fetch_and_parse(&self, url: &str) -> Result<(String, Vec<FeedItem>), RefreshError> {
        let raw = self.fetcher.fetch_raw(url).await?;
        let parsed = parse_feed(&raw)?;
        Ok((parsed.title, normalize_items(parsed.items)))
    }
}

/// Counts one running refresh of a source for as long as it lives.
///
/// Clearing on drop covers every exit path, including a refresh future that
/// is dropped before completion.
struct InFlight<'a> {
    loading: &'a Mutex<HashMap<String, usize>>,
    source_id: String,
}

impl<'a> InFlight<'a> {
    fn enter(loading: &'a Mutex<HashMap<String, usize>>, source_id: &str) -> Self {
        *loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(source_id.to_owned())
            .or_insert(0) += 1;
        Self {
            loading,
            source_id: source_id.to_owned(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut loading = self.loading.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = loading.get_mut(&self.source_id) {
            *running = running.saturating_sub(1);
        }
    }
}
