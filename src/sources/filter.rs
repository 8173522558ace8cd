use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::model::JobSource;

/// Which kind of source a listing shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KindFilter {
    #[default]
    All,
    Links,
    Feeds,
}

/// Search and filter criteria for the source list.
///
/// All criteria must hold. An empty query or tag list matches everything.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    /// Case-insensitive substring matched against name, URL, notes and tags.
    pub query: String,
    /// Source must carry at least one of these tags (exact match).
    pub tags: Vec<String>,
    pub favorites_only: bool,
    pub kind: KindFilter,
}

impl SourceFilter {
    pub fn matches(&self, source: &JobSource) -> bool {
        let query = self.query.trim().to_lowercase();
        if !query.is_empty() {
            let hit = source.name.to_lowercase().contains(&query)
                || source.url.to_lowercase().contains(&query)
                || source.notes.to_lowercase().contains(&query)
                || source.tags.iter().any(|t| t.to_lowercase().contains(&query));
            if !hit {
                return false;
            }
        }

        if !self.tags.is_empty() && !self.tags.iter().any(|t| source.has_tag(t)) {
            return false;
        }

        if self.favorites_only && !source.is_favorite {
            return false;
        }

        match self.kind {
            KindFilter::All => true,
            KindFilter::Links => !source.is_rss_feed,
            KindFilter::Feeds => source.is_rss_feed,
        }
    }
}

pub fn filter_sources<'a>(sources: &'a [JobSource], filter: &SourceFilter) -> Vec<&'a JobSource> {
    sources.iter().filter(|s| filter.matches(s)).collect()
}

/// Every tag in use, sorted and deduplicated.
pub fn all_tags(sources: &[JobSource]) -> Vec<String> {
    sources
        .iter()
        .flat_map(|s| s.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Display order for plain links: favorites first, then most recently opened,
/// then never-opened sources by name.
pub fn sort_links(sources: &mut [&JobSource]) {
    sources.sort_by(|a, b| compare_links(a, b));
}

fn compare_links(a: &JobSource, b: &JobSource) -> Ordering {
    b.is_favorite
        .cmp(&a.is_favorite)
        .then_with(|| match (a.last_opened, b.last_opened) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        })
}
