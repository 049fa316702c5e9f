//! Per-file change tracking.
//!
//! A [`ChangeTracker`] turns one observed edit into either nothing (no
//! commentary warranted) or an [`EditReport`] ready for prompting. Two
//! strategies sit behind the trait:
//!
//! - [`CachedFragmentTracker`] (`mode = "cache"`, the default): diffs every
//!   edit against a baseline that only moves on reset, accumulating added
//!   fragments in a bounded [`ChangeCache`]. A large cumulative diff (branch
//!   switch, paste, refactor) resets the baseline silently.
//! - [`SnapshotDiffTracker`] (`mode = "snapshot"`): diffs every edit against
//!   the previous edit (or the committed revision on first sight) and always
//!   reports.
//!
//! ## Usage
//!
//! ```ignore
//! let tracker = build_tracker(&settings, revisions_for(&root));
//! if let Some(report) = tracker.observe(&edit).await {
//!     let prompt = build_prompt(&report, &style);
//! }
//! ```

mod cache;
mod git;
mod registry;

pub use cache::{ChangeCache, ChangeFragment, DEFAULT_CACHE_SIZE};
pub use git::{GitRevisions, NoRevisions, RevisionSource, revisions_for};
pub use registry::{FileRegistry, FileState};

use crate::diff::{DiffStrategy, LineDiffer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Added-line count above which an edit is treated as disruptive.
pub const DEFAULT_RESET_THRESHOLD: usize = 100;

/// Which tracking strategy is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Bounded cache of added fragments against a stable baseline
    #[default]
    Cache,
    /// Full content plus local and committed diffs on every edit
    Snapshot,
}

impl TrackingMode {
    /// The diff strategy used when none is configured.
    pub fn default_diff(self) -> DiffStrategy {
        match self {
            TrackingMode::Cache => DiffStrategy::Lcs,
            TrackingMode::Snapshot => DiffStrategy::Positional,
        }
    }
}

impl std::fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackingMode::Cache => write!(f, "cache"),
            TrackingMode::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl std::str::FromStr for TrackingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cache" => Ok(TrackingMode::Cache),
            "snapshot" => Ok(TrackingMode::Snapshot),
            _ => anyhow::bail!("Invalid tracking mode '{}'. Valid values: cache, snapshot", s),
        }
    }
}

/// Resolved tracker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub mode: TrackingMode,
    pub diff: DiffStrategy,
    pub cache_size: usize,
    pub reset_threshold: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Cache,
            diff: TrackingMode::Cache.default_diff(),
            cache_size: DEFAULT_CACHE_SIZE,
            reset_threshold: DEFAULT_RESET_THRESHOLD,
        }
    }
}

/// One observed edit: the file and its full current content.
#[derive(Debug, Clone)]
pub struct FileEdit {
    /// Absolute path, the registry key
    pub path: PathBuf,
    /// Path relative to the watched directory, for display and prompts
    pub display_path: String,
    pub content: String,
}

/// Everything the prompt needs about one reportable edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditReport {
    pub path: PathBuf,
    pub display_path: String,
    /// Full current content of the file
    pub content: String,
    /// Cached fragments, oldest first (empty in snapshot mode)
    pub recent_changes: String,
    /// `+ <line>` rendering of lines added since the baseline
    pub local_diff: String,
    /// Unified diff against the committed revision
    pub git_diff: String,
}

#[async_trait]
pub trait ChangeTracker: Send + Sync {
    fn mode(&self) -> TrackingMode;

    /// Process one edit. Edits of the same path are applied one at a time.
    async fn observe(&self, edit: &FileEdit) -> Option<EditReport>;

    /// Drop the baseline and cache for a path (e.g. the file was removed).
    async fn forget(&self, path: &Path);
}

/// Build the tracker selected by `settings`.
pub fn build_tracker(
    settings: &TrackerSettings,
    revisions: Arc<dyn RevisionSource>,
) -> Arc<dyn ChangeTracker> {
    let registry = FileRegistry::new(settings.cache_size);
    let differ = LineDiffer::new(settings.diff);
    match settings.mode {
        TrackingMode::Cache => Arc::new(CachedFragmentTracker {
            registry,
            differ,
            reset_threshold: settings.reset_threshold,
            revisions,
        }),
        TrackingMode::Snapshot => Arc::new(SnapshotDiffTracker {
            registry,
            differ,
            revisions,
        }),
    }
}

fn committed_content(revisions: &dyn RevisionSource, path: &Path) -> String {
    match revisions.head_content(path) {
        Ok(content) => content.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "committed content lookup failed: {e}");
            String::new()
        }
    }
}

fn committed_diff(revisions: &dyn RevisionSource, path: &Path) -> String {
    match revisions.diff_against_head(path) {
        Ok(diff) => diff,
        Err(e) => {
            tracing::warn!(path = %path.display(), "diff against HEAD failed: {e}");
            String::new()
        }
    }
}

/// Accumulates added fragments across edits until the change gets too big.
pub struct CachedFragmentTracker {
    registry: FileRegistry,
    differ: LineDiffer,
    reset_threshold: usize,
    revisions: Arc<dyn RevisionSource>,
}

impl CachedFragmentTracker {
    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }
}

#[async_trait]
impl ChangeTracker for CachedFragmentTracker {
    fn mode(&self) -> TrackingMode {
        TrackingMode::Cache
    }

    async fn observe(&self, edit: &FileEdit) -> Option<EditReport> {
        let entry = self.registry.get_or_create(&edit.path);
        let mut state = entry.lock().await;

        let Some(baseline) = state.baseline() else {
            tracing::debug!(path = %edit.display_path, "first sighting, storing baseline");
            state.rebase(edit.content.clone());
            return None;
        };

        let record = self.differ.diff(baseline, &edit.content);
        let added = record.added_count();
        if added > self.reset_threshold {
            tracing::info!(
                path = %edit.display_path,
                added,
                threshold = self.reset_threshold,
                "change too large to be incremental, resetting baseline"
            );
            state.rebase(edit.content.clone());
            return None;
        }

        for hunk in record.added_hunks(&edit.content) {
            state.cache_mut().add(&hunk);
        }
        let pruned = state.cache_mut().remove_deleted(&edit.content);
        if pruned > 0 {
            tracing::debug!(path = %edit.display_path, pruned, "dropped fragments no longer in file");
        }
        if state.cache().is_empty() {
            tracing::debug!(path = %edit.display_path, "nothing new to report");
            return None;
        }

        let recent_changes = state.cache().context();
        let local_diff = record.render_added();
        let git_diff = committed_diff(self.revisions.as_ref(), &edit.path);

        Some(EditReport {
            path: edit.path.clone(),
            display_path: edit.display_path.clone(),
            content: edit.content.clone(),
            recent_changes,
            local_diff,
            git_diff,
        })
    }

    async fn forget(&self, path: &Path) {
        self.registry.reset(path).await;
    }
}

/// Reports every edit with its diff against the previous one.
pub struct SnapshotDiffTracker {
    registry: FileRegistry,
    differ: LineDiffer,
    revisions: Arc<dyn RevisionSource>,
}

impl SnapshotDiffTracker {
    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }
}

#[async_trait]
impl ChangeTracker for SnapshotDiffTracker {
    fn mode(&self) -> TrackingMode {
        TrackingMode::Snapshot
    }

    async fn observe(&self, edit: &FileEdit) -> Option<EditReport> {
        let entry = self.registry.get_or_create(&edit.path);
        let mut state = entry.lock().await;

        let local_diff = match state.baseline() {
            Some(last) => self.differ.diff(last, &edit.content),
            None => {
                let head = committed_content(self.revisions.as_ref(), &edit.path);
                self.differ.diff(&head, &edit.content)
            }
        }
        .render_added();
        state.set_baseline(edit.content.clone());

        let git_diff = committed_diff(self.revisions.as_ref(), &edit.path);

        Some(EditReport {
            path: edit.path.clone(),
            display_path: edit.display_path.clone(),
            content: edit.content.clone(),
            recent_changes: String::new(),
            local_diff,
            git_diff,
        })
    }

    async fn forget(&self, path: &Path) {
        self.registry.reset(path).await;
    }
}
