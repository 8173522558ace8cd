use thiserror::Error;

use super::types::{FeedItem, UNKNOWN_FEED, UNTITLED};
use super::xml::{parse_document, Element};
use crate::util::truncate_chars;

/// Maximum length of [`FeedItem::summary`], in characters.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// The fetched document is not well-formed XML.
#[derive(Debug, Error)]
#[error("Invalid RSS feed")]
pub struct ParseError;

/// Feed title and items in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub items: Vec<FeedItem>,
}

impl ParsedFeed {
    fn empty() -> Self {
        Self {
            title: UNKNOWN_FEED.to_owned(),
            items: Vec::new(),
        }
    }
}

/// Parses an RSS 2.0 or Atom document.
///
/// The dialect is picked by structure, not by namespace: any `<item>` makes
/// it RSS (even if `<entry>` elements are present too), otherwise any
/// `<entry>` makes it Atom. A well-formed document with neither is an empty
/// feed, not an error.
///
/// # Arguments
///
/// * `raw` - Document text as delivered by a relay
///
/// # Returns
///
/// The feed title (`"Unknown Feed"` when absent) and every item in document
/// order, unsorted and uncapped.
///
/// # Errors
///
/// [`ParseError`] when `raw` is not well-formed XML.
///
/// # Examples
///
/// ```
/// use job_sources::feed::parse_feed;
///
/// let feed = parse_feed(
///     "<rss><channel><title>Jobs</title><item><title>Rust dev</title></item></channel></rss>",
/// )
/// .unwrap();
/// assert_eq!(feed.title, "Jobs");
/// assert_eq!(feed.items[0].title, "Rust dev");
///
/// assert!(parse_feed("<rss><channel>").is_err());
/// ```
pub fn parse_feed(raw: &str) -> Result<ParsedFeed, ParseError> {
    let root = parse_document(raw).map_err(|e| {
        tracing::debug!(error = %e, "Feed document is not well-formed XML");
        ParseError
    })?;

    let rss_items = root.find_all("item");
    if !rss_items.is_empty() {
        return Ok(ParsedFeed {
            title: feed_title(&root, "channel"),
            items: rss_items.into_iter().map(rss_item).collect(),
        });
    }

    let atom_entries = root.find_all("entry");
    if !atom_entries.is_empty() {
        return Ok(ParsedFeed {
            title: feed_title(&root, "feed"),
            items: atom_entries.into_iter().map(atom_entry).collect(),
        });
    }

    Ok(ParsedFeed::empty())
}

/// Title of the first `container` element that has a direct `<title>` child.
fn feed_title(root: &Element, container: &str) -> String {
    root.find_all(container)
        .into_iter()
        .find_map(|c| c.child("title"))
        .map(Element::text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_FEED.to_owned())
}

fn rss_item(item: &Element) -> FeedItem {
    FeedItem {
        title: text_or(item, "title", UNTITLED),
        link: text_of(item, "link"),
        published_at: text_of(item, "pubDate"),
        content: text_of(item, "content:encoded"),
        summary: summary_of(item, "description"),
    }
}

fn atom_entry(entry: &Element) -> FeedItem {
    let published = text_of(entry, "published");
    let published_at = if published.is_empty() {
        text_of(entry, "updated")
    } else {
        published
    };

    FeedItem {
        title: text_or(entry, "title", UNTITLED),
        link: atom_link(entry),
        published_at,
        content: text_of(entry, "content"),
        summary: summary_of(entry, "summary"),
    }
}

/// Atom links carry the URL in `href`; some generators put it in the text instead.
fn atom_link(entry: &Element) -> String {
    let Some(link) = entry.find("link") else {
        return String::new();
    };
    match link.attr("href") {
        Some(href) if !href.is_empty() => href.to_owned(),
        _ => link.text(),
    }
}

/// Text of the first descendant named `name`, or `""`.
fn text_of(el: &Element, name: &str) -> String {
    el.find(name).map(Element::text).unwrap_or_default()
}

fn text_or(el: &Element, name: &str, fallback: &str) -> String {
    let text = text_of(el, name);
    if text.is_empty() {
        fallback.to_owned()
    } else {
        text
    }
}

fn summary_of(el: &Element, name: &str) -> String {
    truncate_chars(&text_of(el, name), SUMMARY_MAX_CHARS).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Rust Jobs</title>
    <link>https://jobs.example.com</link>
    <item>
      <title>Senior Rust Engineer</title>
      <link>https://jobs.example.com/1</link>
      <pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate>
      <description>Build async services.</description>
      <content:encoded><![CDATA[<p>Full posting</p>]]></content:encoded>
    </item>
    <item>
      <title>Embedded Rust Developer</title>
      <link>https://jobs.example.com/2</link>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Remote Rust</title>
  <entry>
    <title>Compiler Engineer</title>
    <link rel="alternate" href="https://remote.example.com/compiler"/>
    <published>2024-01-02T09:00:00Z</published>
    <updated>2024-01-03T09:00:00Z</updated>
    <summary>Work on rustc.</summary>
    <content type="html">Long description</content>
  </entry>
  <entry>
    <title></title>
    <link>https://remote.example.com/text-link</link>
    <updated>2024-01-01T09:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss() {
        let feed = parse_feed(RSS).unwrap();
        assert_eq!(feed.title, "Rust Jobs");
        assert_eq!(feed.items.len(), 2);
        assert_eq!(
            feed.items[0],
            FeedItem {
                title: "Senior Rust Engineer".into(),
                link: "https://jobs.example.com/1".into(),
                published_at: "Tue, 02 Jan 2024 10:00:00 GMT".into(),
                content: "<p>Full posting</p>".into(),
                summary: "Build async services.".into(),
            }
        );
    }

    #[test]
    fn test_parse_atom() {
        let feed = parse_feed(ATOM).unwrap();
        assert_eq!(feed.title, "Remote Rust");
        assert_eq!(
            feed.items[0],
            FeedItem {
                title: "Compiler Engineer".into(),
                link: "https://remote.example.com/compiler".into(),
                published_at: "2024-01-02T09:00:00Z".into(),
                content: "Long description".into(),
                summary: "Work on rustc.".into(),
            }
        );
    }

    #[test]
    fn test_atom_fallbacks() {
        let feed = parse_feed(ATOM).unwrap();
        let second = &feed.items[1];
        assert_eq!(second.title, UNTITLED);
        assert_eq!(second.link, "https://remote.example.com/text-link");
        assert_eq!(second.published_at, "2024-01-01T09:00:00Z");
        assert_eq!(second.summary, "");
        assert_eq!(second.content, "");
    }

    #[test]
    fn test_rss_missing_fields_default_to_empty() {
        let feed = parse_feed("<rss><channel><item><guid>1</guid></item></channel></rss>").unwrap();
        assert_eq!(
            feed.items,
            vec![FeedItem {
                title: UNTITLED.into(),
                link: String::new(),
                published_at: String::new(),
                content: String::new(),
                summary: String::new(),
            }]
        );
    }

    #[test]
    fn test_rss_wins_over_atom_entries() {
        let doc = r#"<rss><channel><title>Mixed</title>
            <item><title>From item</title></item>
            <entry><title>From entry</title></entry>
        </channel></rss>"#;
        let feed = parse_feed(doc).unwrap();
        assert_eq!(feed.title, "Mixed");
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].title, "From item");
    }

    #[test]
    fn test_no_items_or_entries_is_empty_feed() {
        let feed = parse_feed(r#"<rss version="2.0"><channel></channel></rss>"#).unwrap();
        assert_eq!(feed, ParsedFeed::empty());

        let feed = parse_feed("<html><body>Not a feed</body></html>").unwrap();
        assert_eq!(feed.title, UNKNOWN_FEED);
        assert!(feed.items.is_empty());
    }

    #[test]
    fn test_missing_channel_title_falls_back() {
        let feed = parse_feed("<rss><channel><item><title>A</title></item></channel></rss>").unwrap();
        assert_eq!(feed.title, UNKNOWN_FEED);
    }

    #[test]
    fn test_item_title_does_not_leak_into_channel_title() {
        // channel > title only looks at direct children of <channel>
        let feed = parse_feed("<rss><channel><item><title>Item</title></item></channel></rss>").unwrap();
        assert_eq!(feed.title, UNKNOWN_FEED);
    }

    #[test]
    fn test_summary_truncated_to_200_chars() {
        let long = "é".repeat(350);
        let doc = format!(
            "<rss><channel><item><description>{}</description></item></channel></rss>",
            long
        );
        let feed = parse_feed(&doc).unwrap();
        assert_eq!(feed.items[0].summary.chars().count(), SUMMARY_MAX_CHARS);
        assert_eq!(feed.items[0].summary, "é".repeat(200));
    }

    #[test]
    fn test_atom_summary_truncated() {
        let doc = format!(
            "<feed><entry><summary>{}</summary></entry></feed>",
            "x".repeat(201)
        );
        let feed = parse_feed(&doc).unwrap();
        assert_eq!(feed.items[0].summary.len(), 200);
    }

    #[test]
    fn test_atom_empty_published_uses_updated() {
        let doc = "<feed><entry><published></published><updated>2024-03-01</updated></entry></feed>";
        let feed = parse_feed(doc).unwrap();
        assert_eq!(feed.items[0].published_at, "2024-03-01");
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let err = parse_feed("<not valid xml").unwrap_err();
        assert_eq!(err.to_string(), "Invalid RSS feed");
        assert!(parse_feed("").is_err());
        assert!(parse_feed("<rss><channel></rss>").is_err());
    }

    #[test]
    fn test_items_keep_document_order() {
        let feed = parse_feed(RSS).unwrap();
        let titles: Vec<&str> = feed.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Senior Rust Engineer", "Embedded Rust Developer"]);
    }
}
