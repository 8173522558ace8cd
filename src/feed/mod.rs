//! Feed ingestion: fetch a feed through relays, parse it, normalize it.
//!
//! - [`relay`] - ordered fallback across relay endpoints (`wrapped-json` / `raw-text`)
//! - [`parser`] - RSS 2.0 / Atom detection and field extraction
//! - [`normalize`] - newest-first ordering capped at ten items
//! - [`refresher`] - the non-failing `refresh` entry point with in-flight tracking
//!
//! # Example
//!
//! ```ignore
//! use job_sources::feed::{default_relays, FeedRefresher, RelayFetcher};
//!
//! let refresher = FeedRefresher::new(RelayFetcher::new(reqwest::Client::new(), default_relays()));
//! let result = refresher.refresh(&source.id, &source.url).await;
//! if let Some(err) = &result.error_message {
//!     eprintln!("{}: {}", source.name, err);
//! }
//! ```

pub mod normalize;
pub mod parser;
pub mod refresher;
pub mod relay;
mod types;
mod xml;

pub use normalize::{normalize_items, MAX_ITEMS};
pub use parser::{parse_feed, ParseError, ParsedFeed, SUMMARY_MAX_CHARS};
pub use refresher::FeedRefresher;
pub use relay::{default_relays, FetchError, RelayConfig, RelayFetcher, ResponseShape};
pub use types::{FeedItem, FeedResult, ERROR_TITLE, UNKNOWN_FEED, UNTITLED};
