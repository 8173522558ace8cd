use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use job_sources::config::Config;
use job_sources::feed::{FeedRefresher, FeedResult, RelayFetcher};
use job_sources::sources::{
    bulk_select, filter_sources, highlight_rust, mentions_rust, open_each, sort_links,
    BulkSelection, JobSource, KindFilter, SourceFilter,
};
use job_sources::store::{SourceStore, SourceUpdate};
use job_sources::util::{strip_control_chars, truncate_to_width};

const TITLE_WIDTH: usize = 80;
const SUMMARY_WIDTH: usize = 120;

/// Get the config directory path (~/.config/job-sources/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("job-sources"))
}

#[derive(Parser, Debug)]
#[command(
    name = "job-sources",
    about = "Bookmark job boards and follow their RSS/Atom feeds"
)]
struct Args {
    /// Config file (default: ~/.config/job-sources/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save a new source
    Add {
        url: String,
        /// The URL is an RSS/Atom feed
        #[arg(long)]
        rss: bool,
        /// Display name (default: the URL's domain)
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a source and its cached feed
    Remove { id: String },
    /// List saved sources
    List {
        /// Case-insensitive search over name, URL, notes and tags
        #[arg(long, short)]
        query: Option<String>,
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        #[arg(long)]
        favorites: bool,
        /// Only RSS/Atom feeds
        #[arg(long, conflicts_with = "links")]
        feeds: bool,
        /// Only plain links
        #[arg(long)]
        links: bool,
    },
    /// Add tags to a source
    Tag {
        id: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove tags from a source
    Untag {
        id: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Toggle a source's favorite flag
    Favorite { id: String },
    /// Open links in the browser: all, unvisited, favorites or tag:<name>
    Open { selection: BulkSelection },
    /// Refresh or show feeds
    Feeds {
        #[command(subcommand)]
        command: FeedsCommand,
    },
    /// Refresh all feeds now and then every `refresh_interval_minutes`
    Watch,
    /// Write all sources and feeds to a JSON file
    Export { file: PathBuf },
    /// Replace all sources and feeds with a JSON export (backs up the current data first)
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum FeedsCommand {
    /// Refresh one feed, or every feed when no id is given
    Refresh { id: Option<String> },
    /// Print the last fetched items of a feed
    Show { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        restrict_permissions(&config_dir);
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let data_path = config
        .data_file
        .clone()
        .unwrap_or_else(|| config_dir.join("sources.json"));
    let mut store = SourceStore::open(&data_path)
        .with_context(|| format!("Failed to open data file {}", data_path.display()))?;

    match args.command {
        Command::Add {
            url,
            rss,
            name,
            tags,
            notes,
        } => {
            let id = store.add_source(&url, rss)?.id.clone();
            if name.is_some() || notes.is_some() || !tags.is_empty() {
                store.update_source(
                    &id,
                    SourceUpdate {
                        name,
                        notes,
                        tags: (!tags.is_empty()).then_some(tags),
                        ..Default::default()
                    },
                )?;
            }
            store.save()?;
            let source = store.resolve(&id)?;
            println!("Added {} ({})", display(&source.name, TITLE_WIDTH), short_id(&source.id));
        }
        Command::Remove { id } => {
            let removed = store.delete_source(&id)?;
            store.save()?;
            println!("Removed {}", display(&removed.name, TITLE_WIDTH));
        }
        Command::List {
            query,
            tags,
            favorites,
            feeds,
            links,
        } => {
            let kind = match (feeds, links) {
                (true, _) => KindFilter::Feeds,
                (_, true) => KindFilter::Links,
                _ => KindFilter::All,
            };
            let filter = SourceFilter {
                query: query.unwrap_or_default(),
                tags,
                favorites_only: favorites,
                kind,
            };
            print_sources(&store, &filter);
        }
        Command::Tag { id, tags } => {
            let added = store.add_tags(&id, &tags)?;
            store.save()?;
            println!("Added {added} tag(s)");
        }
        Command::Untag { id, tags } => {
            let removed = store.remove_tags(&id, &tags)?;
            store.save()?;
            println!("Removed {removed} tag(s)");
        }
        Command::Favorite { id } => {
            let favorite = store.toggle_favorite(&id)?;
            store.save()?;
            println!(
                "{}",
                if favorite {
                    "Marked as favorite"
                } else {
                    "Removed from favorites"
                }
            );
        }
        Command::Open { selection } => open_selection(&mut store, &selection)?,
        Command::Feeds {
            command: FeedsCommand::Refresh { id },
        } => {
            let refresher = build_refresher(&config)?;
            let targets = match id {
                Some(id) => {
                    let source = store.resolve(&id)?;
                    if !source.is_rss_feed {
                        anyhow::bail!("{} is not an RSS feed", display(&source.name, TITLE_WIDTH));
                    }
                    vec![(source.id.clone(), source.url.clone())]
                }
                None => feed_targets(store.sources()),
            };
            refresh_into(&refresher, &mut store, &targets).await?;
        }
        Command::Feeds {
            command: FeedsCommand::Show { id },
        } => {
            let source = store.resolve(&id)?;
            match store.feed(&source.id) {
                Some(feed) => print_feed(feed),
                None => println!(
                    "No items fetched yet. Run: job-sources feeds refresh {}",
                    short_id(&source.id)
                ),
            }
        }
        Command::Watch => watch(&config, &data_path).await?,
        Command::Export { file } => {
            store
                .export_to(&file)
                .with_context(|| format!("Failed to export to {}", file.display()))?;
            println!(
                "Exported {} sources to {}",
                store.sources().len(),
                file.display()
            );
        }
        Command::Import { file } => import(&mut store, &config_dir, &file)?,
    }

    Ok(())
}

/// Owner-only access to the config directory.
fn restrict_permissions(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

fn build_refresher(config: &Config) -> Result<FeedRefresher> {
    let client = config.build_client()?;
    Ok(FeedRefresher::new(RelayFetcher::new(
        client,
        config.relays.clone(),
    )))
}

fn feed_targets(sources: &[JobSource]) -> Vec<(String, String)> {
    sources
        .iter()
        .filter(|s| s.is_rss_feed)
        .map(|s| (s.id.clone(), s.url.clone()))
        .collect()
}

/// Refreshes `targets`, stores the results and prints a one-line summary per feed.
async fn refresh_into(
    refresher: &FeedRefresher,
    store: &mut SourceStore,
    targets: &[(String, String)],
) -> Result<()> {
    if targets.is_empty() {
        println!("No feeds to refresh");
        return Ok(());
    }

    let results = refresher
        .refresh_all(targets.iter().map(|(id, url)| (id.as_str(), url.as_str())))
        .await;

    for result in results {
        let name = store
            .resolve(&result.source_id)
            .map(|s| display(&s.name, TITLE_WIDTH))
            .unwrap_or_else(|_| short_id(&result.source_id).to_string());
        match &result.error_message {
            Some(message) => println!("✗ {name}: {}", display(message, SUMMARY_WIDTH)),
            None => {
                let flagged = result
                    .items
                    .iter()
                    .filter(|i| mentions_rust(&i.title) || mentions_rust(&i.summary))
                    .count();
                println!(
                    "✓ {name}: {} item(s), {flagged} mentioning Rust",
                    result.items.len()
                );
            }
        }
        store.set_feed(result);
    }

    store.save()?;
    Ok(())
}

/// Refreshes every feed on a fixed interval until interrupted.
///
/// The data file is re-read each cycle so edits from other invocations are kept.
async fn watch(config: &Config, data_path: &Path) -> Result<()> {
    let refresher = build_refresher(config)?;
    let Some(period) = config.refresh_interval() else {
        let mut store = SourceStore::open(data_path)?;
        let targets = feed_targets(store.sources());
        return refresh_into(&refresher, &mut store, &targets).await;
    };

    println!(
        "Refreshing feeds every {} minute(s). Press Ctrl+C to stop.",
        config.refresh_interval_minutes
    );
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut store = SourceStore::open(data_path)?;
                let targets = feed_targets(store.sources());
                tracing::info!(feeds = targets.len(), "Starting scheduled refresh");
                if let Err(e) = refresh_into(&refresher, &mut store, &targets).await {
                    tracing::warn!(error = %e, "Scheduled refresh failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped.");
                return Ok(());
            }
        }
    }
}

fn open_selection(store: &mut SourceStore, selection: &BulkSelection) -> Result<()> {
    let today = Local::now().date_naive();
    let mut selected = bulk_select(store.sources(), selection, today);
    sort_links(&mut selected);
    if selected.is_empty() {
        println!("No links match '{selection}'");
        return Ok(());
    }

    let report = open_each(&selected, |url| open::that(url));
    for (id, error) in &report.failed {
        eprintln!("Failed to open {}: {error}", short_id(id));
    }

    let now = Utc::now();
    for id in &report.opened {
        store.mark_opened(id, now)?;
    }
    store.save()?;
    println!("Opened {} link(s)", report.opened.len());
    Ok(())
}

fn import(store: &mut SourceStore, config_dir: &Path, file: &Path) -> Result<()> {
    let canonical = file
        .canonicalize()
        .with_context(|| format!("Failed to resolve import file: {}", file.display()))?;
    if !std::fs::metadata(&canonical)?.is_file() {
        anyhow::bail!("Import path must be a regular file");
    }

    if !store.sources().is_empty() {
        let backup_path = config_dir.join(format!(
            "sources.json.backup.{}",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        store.export_to(&backup_path).with_context(|| {
            format!(
                "Failed to create backup at '{}'. Nothing was imported.",
                backup_path.display()
            )
        })?;
        println!("Backed up existing sources to: {}", backup_path.display());
    }

    let count = store
        .import_from(&canonical)
        .with_context(|| format!("Failed to import {}", canonical.display()))?;
    store.save()?;
    println!("Imported {count} sources");
    Ok(())
}

fn print_sources(store: &SourceStore, filter: &SourceFilter) {
    let matched = filter_sources(store.sources(), filter);
    let (mut links, feeds): (Vec<&JobSource>, Vec<&JobSource>) =
        matched.into_iter().partition(|s| !s.is_rss_feed);
    sort_links(&mut links);

    if links.is_empty() && feeds.is_empty() {
        println!("No sources");
        return;
    }

    for source in links.iter().chain(feeds.iter()) {
        let marker = if source.is_favorite { '★' } else { ' ' };
        let kind = if source.is_rss_feed { "rss " } else { "link" };
        println!(
            "{marker} {} [{kind}] {}  {}",
            short_id(&source.id),
            display(&source.name, TITLE_WIDTH),
            display(&source.url, TITLE_WIDTH)
        );

        let mut details = Vec::new();
        if !source.tags.is_empty() {
            details.push(format!("tags: {}", source.tags.join(", ")));
        }
        if let Some(opened) = source.last_opened {
            details.push(format!("opened {}", local_time(opened)));
        }
        if let Some(feed) = store.feed(&source.id) {
            details.push(match &feed.error_message {
                Some(message) => format!("last refresh failed: {message}"),
                None => format!("{} item(s) at {}", feed.items.len(), local_time(feed.fetched_at)),
            });
        }
        if !details.is_empty() {
            println!("             {}", display(&details.join(" · "), SUMMARY_WIDTH));
        }
    }
}

fn print_feed(feed: &FeedResult) {
    let color = std::io::stdout().is_terminal();
    println!(
        "{} (fetched {})",
        display(&feed.title, TITLE_WIDTH),
        local_time(feed.fetched_at)
    );
    if let Some(message) = &feed.error_message {
        println!("  Error: {}", display(message, SUMMARY_WIDTH));
        return;
    }
    if feed.items.is_empty() {
        println!("  No items");
    }
    for item in &feed.items {
        let flag = if mentions_rust(&item.title) || mentions_rust(&item.summary) {
            "🦀"
        } else {
            "  "
        };
        let title = display(&item.title, TITLE_WIDTH);
        if color {
            println!("{flag} {}", highlight_rust(&title, "\x1b[1;33m", "\x1b[0m"));
        } else {
            println!("{flag} {title}");
        }
        if !item.published_at.is_empty() {
            println!("     {}", display(&item.published_at, TITLE_WIDTH));
        }
        if !item.link.is_empty() {
            println!("     {}", display(&item.link, SUMMARY_WIDTH));
        }
        if !item.summary.is_empty() {
            println!("     {}", display(&item.summary, SUMMARY_WIDTH));
        }
    }
}

/// Feed-controlled text made safe for a terminal line.
fn display(s: &str, width: usize) -> String {
    let clean = strip_control_chars(s);
    let single_line = clean.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_to_width(&single_line, width).into_owned()
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
