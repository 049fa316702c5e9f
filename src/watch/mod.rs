//! Directory watching.
//!
//! Wraps a recursive `notify` watcher and turns its raw events into
//! [`WatchEvent`]s for files matching the configured globs. The notify
//! callback runs on its own thread and forwards into a tokio channel, so the
//! rest of the pipeline stays on the async runtime.

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// Created or written
    Changed,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    /// Absolute path
    pub path: PathBuf,
    /// Path relative to the watched directory, `/`-separated
    pub relative: String,
}

/// Include/ignore glob filter over watch-relative paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Vec<glob::Pattern>,
    ignore: Vec<glob::Pattern>,
}

impl PathFilter {
    pub fn new(include: &[String], ignore: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<glob::Pattern>> {
            patterns
                .iter()
                .map(|p| glob::Pattern::new(p).with_context(|| format!("Invalid glob '{}'", p)))
                .collect()
        };

        Ok(Self {
            include: compile(include)?,
            ignore: compile(ignore)?,
        })
    }

    pub fn matches(&self, relative: &str) -> bool {
        self.include.iter().any(|p| p.matches(relative))
            && !self.ignore.iter().any(|p| p.matches(relative))
    }
}

/// What a raw notify event means for the files it names.
fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Changed),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(WatchEventKind::Removed),
        EventKind::Modify(_) => Some(WatchEventKind::Changed),
        EventKind::Remove(_) => Some(WatchEventKind::Removed),
        _ => None,
    }
}

/// `/`-separated path of `path` relative to `root`, if it is inside it.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// Recursive watcher over one directory.
pub struct DirWatcher {
    root: PathBuf,
    filter: PathFilter,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    ready: VecDeque<WatchEvent>,
    // Dropping the watcher stops event delivery.
    _watcher: RecommendedWatcher,
}

impl DirWatcher {
    pub fn start(root: &Path, filter: PathFilter) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", root.display()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone only during shutdown.
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        Ok(Self {
            root,
            filter,
            rx,
            ready: VecDeque::new(),
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next event for a matching file; `None` once the watcher is closed.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }

            match self.rx.recv().await? {
                Ok(event) => self.absorb(event),
                Err(e) => tracing::warn!("file watcher error: {e}"),
            }
        }
    }

    fn absorb(&mut self, event: Event) {
        let Some(kind) = classify(&event.kind) else {
            return;
        };

        for path in event.paths {
            if kind == WatchEventKind::Changed && path.is_dir() {
                continue;
            }
            let Some(relative) = relative_to(&self.root, &path) else {
                continue;
            };
            if !self.filter.matches(&relative) {
                tracing::trace!(path = %relative, "ignored by filter");
                continue;
            }
            self.ready.push_back(WatchEvent {
                kind,
                path,
                relative,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_include_and_ignore() {
        let filter = PathFilter::new(
            &strings(&["**/*.rs", "Cargo.toml"]),
            &strings(&["target/**"]),
        )
        .unwrap();

        assert!(filter.matches("src/main.rs"));
        assert!(filter.matches("Cargo.toml"));
        assert!(!filter.matches("README.md"));
        assert!(!filter.matches("target/debug/build.rs"));
    }

    #[test]
    fn test_default_globs_skip_git_internals() {
        let filter = PathFilter::new(&strings(&["**/*"]), &strings(&[".git/**"])).unwrap();
        assert!(filter.matches("notes.txt"));
        assert!(!filter.matches(".git/index"));
        assert!(!filter.matches(".git/refs/heads/main"));
    }

    #[test]
    fn test_filter_rejects_bad_glob() {
        assert!(PathFilter::new(&strings(&["["]), &[]).is_err());
    }

    #[test]
    fn test_classify_event_kinds() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(WatchEventKind::Changed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(WatchEventKind::Changed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(WatchEventKind::Removed)
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            Some(WatchEventKind::Removed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            None
        );
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/work");
        assert_eq!(
            relative_to(root, Path::new("/work/src/lib.rs")).as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(relative_to(root, Path::new("/work")), None);
        assert_eq!(relative_to(root, Path::new("/elsewhere/a.rs")), None);
    }

    #[tokio::test]
    async fn test_watcher_reports_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::new(&strings(&["**/*.txt"]), &[]).unwrap();
        let mut watcher = match DirWatcher::start(dir.path(), filter) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("Skipping test_watcher_reports_written_file: {:?}", e);
                return;
            }
        };

        std::fs::write(dir.path().join("ignored.md"), "x").unwrap();
        std::fs::write(dir.path().join("note.txt"), "hello").unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(10), watcher.next())
            .await
            .expect("no watch event within 10s")
            .unwrap();
        assert_eq!(event.relative, "note.txt");
        assert_eq!(event.kind, WatchEventKind::Changed);
        assert!(event.path.starts_with(watcher.root()));
    }
}
