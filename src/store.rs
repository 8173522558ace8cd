//! JSON file persistence for sources and their last feed results.
//!
//! The whole state lives in one pretty-printed JSON document. Mutations only
//! touch the in-memory copy; callers decide when to [`SourceStore::save`].
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::feed::FeedResult;
use crate::sources::{validate_source_url, JobSource, SourceError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("A source with URL {0} already exists")]
    DuplicateUrl(String),

    #[error("No source with id {0}")]
    NotFound(String),

    #[error("Id prefix {0} matches more than one source")]
    AmbiguousId(String),
}

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppState {
    pub sources: Vec<JobSource>,
    /// Last refresh result per feed source id.
    pub feeds: HashMap<String, FeedResult>,
}

/// Partial update for [`SourceStore::update_source`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct SourceUpdate {
    pub url: Option<String>,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_rss_feed: Option<bool>,
}

#[derive(Debug)]
pub struct SourceStore {
    path: PathBuf,
    state: AppState,
}

impl SourceStore {
    /// Loads the store at `path`. A missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => AppState::default(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No data file yet, starting empty");
                AppState::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn sources(&self) -> &[JobSource] {
        &self.state.sources
    }

    pub fn feed(&self, source_id: &str) -> Option<&FeedResult> {
        self.state.feeds.get(source_id)
    }

    /// Finds a source by full id or by a unique id prefix.
    pub fn resolve(&self, id: &str) -> Result<&JobSource, StoreError> {
        let idx = self.resolve_index(id)?;
        Ok(&self.state.sources[idx])
    }

    fn resolve_index(&self, id: &str) -> Result<usize, StoreError> {
        if let Some(idx) = self.state.sources.iter().position(|s| s.id == id) {
            return Ok(idx);
        }
        if id.is_empty() {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        let mut matches = self
            .state
            .sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.id.starts_with(id))
            .map(|(idx, _)| idx);
        match (matches.next(), matches.next()) {
            (Some(idx), None) => Ok(idx),
            (Some(_), Some(_)) => Err(StoreError::AmbiguousId(id.to_owned())),
            (None, _) => Err(StoreError::NotFound(id.to_owned())),
        }
    }

    fn source_mut(&mut self, id: &str) -> Result<&mut JobSource, StoreError> {
        let idx = self.resolve_index(id)?;
        Ok(&mut self.state.sources[idx])
    }

    /// Adds a new source. Rejects non-http(s) URLs and URLs already stored.
    pub fn add_source(&mut self, url: &str, is_rss_feed: bool) -> Result<&JobSource, StoreError> {
        let url = validate_source_url(url)?.to_string();
        if self.state.sources.iter().any(|s| s.url == url) {
            return Err(StoreError::DuplicateUrl(url));
        }

        let source = JobSource::new(&url, is_rss_feed);
        tracing::debug!(id = %source.id, url = %source.url, "Added source");
        self.state.sources.push(source);
        let last = self.state.sources.len() - 1;
        Ok(&self.state.sources[last])
    }

    pub fn update_source(
        &mut self,
        id: &str,
        update: SourceUpdate,
    ) -> Result<&JobSource, StoreError> {
        let url = match update.url {
            Some(url) => Some(validate_source_url(&url)?.to_string()),
            None => None,
        };

        let source = self.source_mut(id)?;
        if let Some(url) = url {
            source.url = url;
        }
        if let Some(name) = update.name {
            source.name = name;
        }
        if let Some(notes) = update.notes {
            source.notes = notes;
        }
        if let Some(tags) = update.tags {
            source.tags.clear();
            source.add_tags(tags);
        }
        if let Some(is_rss_feed) = update.is_rss_feed {
            source.is_rss_feed = is_rss_feed;
        }
        source.updated_at = Utc::now();
        Ok(source)
    }

    /// Adds tags to a source, returning how many were new.
    pub fn add_tags(&mut self, id: &str, tags: &[String]) -> Result<usize, StoreError> {
        let source = self.source_mut(id)?;
        let added = source.add_tags(tags);
        if added > 0 {
            source.updated_at = Utc::now();
        }
        Ok(added)
    }

    /// Removes tags from a source, returning how many were present.
    pub fn remove_tags(&mut self, id: &str, tags: &[String]) -> Result<usize, StoreError> {
        let source = self.source_mut(id)?;
        let removed = source.remove_tags(tags);
        if removed > 0 {
            source.updated_at = Utc::now();
        }
        Ok(removed)
    }

    /// Removes a source together with its stored feed result.
    pub fn delete_source(&mut self, id: &str) -> Result<JobSource, StoreError> {
        let idx = self.resolve_index(id)?;
        let removed = self.state.sources.remove(idx);
        self.state.feeds.remove(&removed.id);
        Ok(removed)
    }

    pub fn mark_opened(&mut self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.source_mut(id)?.last_opened = Some(at);
        Ok(())
    }

    /// Flips the favorite flag and returns the new value.
    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool, StoreError> {
        let source = self.source_mut(id)?;
        source.is_favorite = !source.is_favorite;
        Ok(source.is_favorite)
    }

    /// Stores a refresh result, replacing the previous one for that source.
    ///
    /// Results for sources deleted while the refresh was running are dropped.
    pub fn set_feed(&mut self, result: FeedResult) {
        if !self.state.sources.iter().any(|s| s.id == result.source_id) {
            tracing::debug!(source_id = %result.source_id, "Dropping feed result for unknown source");
            return;
        }
        self.state.feeds.insert(result.source_id.clone(), result);
    }

    /// Writes the current state to the store's own path.
    pub fn save(&self) -> Result<(), StoreError> {
        write_state(&self.path, &self.state)?;
        tracing::debug!(
            path = %self.path.display(),
            sources = self.state.sources.len(),
            "Saved data file"
        );
        Ok(())
    }

    pub fn export_to(&self, path: &Path) -> Result<(), StoreError> {
        write_state(path, &self.state)
    }

    /// Replaces the whole state with the contents of `path`.
    ///
    /// The file is fully parsed before anything is replaced, so a bad import
    /// leaves the current state untouched. Returns the number of sources loaded.
    pub fn import_from(&mut self, path: &Path) -> Result<usize, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let state: AppState = serde_json::from_str(&content)?;
        self.state = state;
        Ok(self.state.sources.len())
    }
}

/// Writes via a temp file and rename so the data file is never left half-written.
fn write_state(path: &Path, state: &AppState) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(state)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);

    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);

        // Windows refuses to rename over an existing file
        #[cfg(windows)]
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        std::fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Sibling temp file with a random v4 UUID suffix. The name cannot be
/// guessed in advance, so `create_new` never lands on a planted symlink.
fn temp_path_for(path: &Path) -> PathBuf {
    path.with_extension(format!("tmp.{}", Uuid::new_v4().simple()))
}
