//! Bookmarked job-search sources and the operations the list view needs.
//!
//! - [`model`] - the `JobSource` record, URL validation and domain helpers
//! - [`filter`] - search/tag/favorite filtering and link ordering
//! - [`bulk`] - bulk-open selections and visit tracking by local date
//! - [`keywords`] - Rust keyword detection for feed items

pub mod bulk;
pub mod filter;
pub mod keywords;
pub mod model;

pub use bulk::{bulk_select, open_each, opened_on, BulkSelection, OpenReport};
pub use filter::{all_tags, filter_sources, sort_links, KindFilter, SourceFilter};
pub use keywords::{highlight_rust, mentions_rust};
pub use model::{extract_domain, favicon_url, validate_source_url, JobSource, SourceError};
