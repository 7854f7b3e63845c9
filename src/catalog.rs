use std::collections::HashSet;

use serde::Serialize;

use crate::store::Video;

/// Where the cached catalog stands from the point of view of a reader.
/// `LoadError` is only reachable while nothing usable has been installed;
/// once a snapshot is in place, a failed refresh leaves it untouched. No
/// state is terminal, a refresh can always be re-triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CatalogState {
    Loading,
    Loaded,
    LoadError,
}

/// The most recent full catalog fetch, shared across request handlers.
///
/// The snapshot is only ever replaced wholesale (`install`) or filtered
/// (`remove`), never partially mutated. Fetch tokens are monotonically
/// increasing; a fetch that completes after a newer one has been installed
/// is discarded, so a stale in-flight `list_all` can never clobber fresher
/// data.
#[derive(Debug)]
pub struct CatalogCache {
    videos: Vec<Video>,
    state: CatalogState,
    fetch_seq: u64,
    installed_seq: u64,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    pub fn new() -> Self {
        Self {
            videos: Vec::new(),
            state: CatalogState::Loading,
            fetch_seq: 0,
            installed_seq: 0,
        }
    }

    /// Claim a token for a fetch that is about to start.
    pub fn begin_fetch(&mut self) -> u64 {
        self.fetch_seq += 1;
        self.fetch_seq
    }

    /// Install a completed fetch. Returns false when the result arrived
    /// after a newer snapshot and was discarded.
    pub fn install(&mut self, token: u64, videos: Vec<Video>) -> bool {
        if token < self.installed_seq {
            tracing::debug!(
                "Discarding superseded catalog fetch {} (installed {})",
                token,
                self.installed_seq
            );
            return false;
        }
        self.videos = videos;
        self.installed_seq = token;
        self.state = CatalogState::Loaded;
        true
    }

    /// Record a failed fetch. Only degrades the state while nothing has been
    /// loaded yet; an installed snapshot stays served as-is.
    pub fn mark_error(&mut self, token: u64) {
        if token >= self.installed_seq && self.state != CatalogState::Loaded {
            self.state = CatalogState::LoadError;
        }
    }

    pub fn state(&self) -> CatalogState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == CatalogState::Loaded
    }

    pub fn snapshot(&self) -> Vec<Video> {
        self.videos.clone()
    }

    /// Optimistic insert after a successful create. The store assigns
    /// `created_at = now`, so the front keeps the list ordered.
    pub fn insert(&mut self, video: Video) {
        if self.state == CatalogState::Loaded {
            self.videos.insert(0, video);
        }
    }

    /// Prune one record after a confirmed backend delete; no re-fetch needed.
    pub fn remove(&mut self, id: &str) {
        self.videos.retain(|video| video.id != id);
    }
}

/// Case-insensitive containment match on title OR description. An empty or
/// blank query returns the full list in its original order.
pub fn filter_substring(videos: &[Video], query: &str) -> Vec<Video> {
    if query.trim().is_empty() {
        return videos.to_vec();
    }
    let needle = query.to_lowercase();
    videos
        .iter()
        .filter(|video| {
            video.title.to_lowercase().contains(&needle)
                || video.description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Keep the subset whose titles the relevance collaborator judged matching,
/// preserving the original order.
pub fn filter_by_titles(videos: &[Video], titles: &[String]) -> Vec<Video> {
    let wanted: HashSet<&str> = titles.iter().map(|t| t.as_str()).collect();
    videos
        .iter()
        .filter(|video| wanted.contains(video.title.as_str()))
        .cloned()
        .collect()
}
