use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, Utc};

use super::model::JobSource;

/// Which plain links a bulk "open" acts on. Feeds are never bulk-opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkSelection {
    All,
    /// Never opened, or last opened before today (local date).
    UnvisitedToday,
    Favorites,
    Tag(String),
}

impl FromStr for BulkSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "unvisited" => Ok(Self::UnvisitedToday),
            "favorites" => Ok(Self::Favorites),
            _ => match s.strip_prefix("tag:") {
                Some(tag) if !tag.is_empty() => Ok(Self::Tag(tag.to_owned())),
                _ => Err(format!(
                    "unknown selection '{s}' (expected all, unvisited, favorites or tag:<name>)"
                )),
            },
        }
    }
}

impl fmt::Display for BulkSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::UnvisitedToday => f.write_str("unvisited"),
            Self::Favorites => f.write_str("favorites"),
            Self::Tag(tag) => write!(f, "tag:{tag}"),
        }
    }
}

/// True when `opened` falls on `today` in the local time zone.
pub fn opened_on(opened: Option<DateTime<Utc>>, today: NaiveDate) -> bool {
    opened.is_some_and(|at| at.with_timezone(&Local).date_naive() == today)
}

/// Plain links matching `selection`, in their stored order.
pub fn bulk_select<'a>(
    sources: &'a [JobSource],
    selection: &BulkSelection,
    today: NaiveDate,
) -> Vec<&'a JobSource> {
    sources
        .iter()
        .filter(|s| !s.is_rss_feed)
        .filter(|s| match selection {
            BulkSelection::All => true,
            BulkSelection::UnvisitedToday => !opened_on(s.last_opened, today),
            BulkSelection::Favorites => s.is_favorite,
            BulkSelection::Tag(tag) => s.has_tag(tag),
        })
        .collect()
}

/// Outcome of opening a batch of sources.
#[derive(Debug, Default)]
pub struct OpenReport {
    /// IDs of sources that were handed to the opener successfully.
    pub opened: Vec<String>,
    /// IDs and error messages of sources that could not be opened.
    pub failed: Vec<(String, String)>,
}

/// Opens each source with `opener`, continuing past failures.
pub fn open_each<F>(sources: &[&JobSource], mut opener: F) -> OpenReport
where
    F: FnMut(&str) -> std::io::Result<()>,
{
    let mut report = OpenReport::default();
    for source in sources {
        match opener(&source.url) {
            Ok(()) => report.opened.push(source.id.clone()),
            Err(e) => {
                tracing::warn!(url = %source.url, error = %e, "Failed to open source");
                report.failed.push((source.id.clone(), e.to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn link(name: &str) -> JobSource {
        let mut s = JobSource::new(&format!("https://{name}.example"), false);
        s.name = name.to_owned();
        s
    }

    fn names<'a>(sources: &[&'a JobSource]) -> Vec<&'a str> {
        sources.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!("all".parse::<BulkSelection>().unwrap(), BulkSelection::All);
        assert_eq!(
            "unvisited".parse::<BulkSelection>().unwrap(),
            BulkSelection::UnvisitedToday
        );
        assert_eq!(
            "tag:remote".parse::<BulkSelection>().unwrap(),
            BulkSelection::Tag("remote".into())
        );
        assert!("tag:".parse::<BulkSelection>().is_err());
        assert!("everything".parse::<BulkSelection>().is_err());
        assert_eq!(BulkSelection::Tag("x".into()).to_string(), "tag:x");
    }

    #[test]
    fn test_feeds_never_selected() {
        let mut feed = link("feed");
        feed.is_rss_feed = true;
        feed.is_favorite = true;
        let sources = vec![feed, link("plain")];
        let today = Local::now().date_naive();

        assert_eq!(names(&bulk_select(&sources, &BulkSelection::All, today)), vec!["plain"]);
        assert!(bulk_select(&sources, &BulkSelection::Favorites, today).is_empty());
    }

    #[test]
    fn test_unvisited_today() {
        let now = Local::now();
        let today = now.date_naive();

        let mut seen_today = link("today");
        seen_today.last_opened = Some(now.with_timezone(&Utc));
        let mut seen_before = link("before");
        seen_before.last_opened = Some((now - Duration::days(3)).with_timezone(&Utc));
        let never = link("never");

        let sources = vec![seen_today, seen_before, never];
        assert_eq!(
            names(&bulk_select(&sources, &BulkSelection::UnvisitedToday, today)),
            vec!["before", "never"]
        );
    }

    #[test]
    fn test_by_tag_and_favorites() {
        let mut remote = link("remote");
        remote.add_tags(["remote"]);
        let mut fav = link("fav");
        fav.is_favorite = true;
        let sources = vec![remote, fav];
        let today = Local::now().date_naive();

        assert_eq!(
            names(&bulk_select(&sources, &BulkSelection::Tag("remote".into()), today)),
            vec!["remote"]
        );
        assert_eq!(
            names(&bulk_select(&sources, &BulkSelection::Favorites, today)),
            vec!["fav"]
        );
    }

    #[test]
    fn test_opened_on() {
        let at = Local.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let day = at.date_naive();
        assert!(opened_on(Some(at.with_timezone(&Utc)), day));
        assert!(!opened_on(Some(at.with_timezone(&Utc)), day.succ_opt().unwrap()));
        assert!(!opened_on(None, day));
    }

    #[test]
    fn test_open_each_continues_past_failures() {
        let sources = vec![link("a"), link("b"), link("c")];
        let refs: Vec<&JobSource> = sources.iter().collect();
        let mut seen = Vec::new();

        let report = open_each(&refs, |url| {
            seen.push(url.to_owned());
            if url.contains("b.example") {
                Err(std::io::Error::other("no browser"))
            } else {
                Ok(())
            }
        });

        assert_eq!(seen.len(), 3);
        assert_eq!(report.opened, vec![sources[0].id.clone(), sources[2].id.clone()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, sources[1].id);
        assert_eq!(report.failed[0].1, "no browser");
    }
}
