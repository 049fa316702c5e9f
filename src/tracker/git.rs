use crate::errors::RevisionError;
use git2::{DiffFormat, DiffOptions, ErrorCode, Oid, Repository};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Access to the last committed revision of a file.
///
/// Paths are absolute paths inside the watched directory. Callers treat any
/// error as "no history" and continue with empty content.
pub trait RevisionSource: Send + Sync {
    /// Content of `path` at HEAD, or `None` if it is not committed.
    fn head_content(&self, path: &Path) -> Result<Option<String>, RevisionError>;

    /// Unified diff of the working file against HEAD (empty when identical).
    fn diff_against_head(&self, path: &Path) -> Result<String, RevisionError>;
}

/// Pick git-backed lookups when `dir` is inside a repository, otherwise none.
pub fn revisions_for(dir: &Path) -> Arc<dyn RevisionSource> {
    match GitRevisions::discover(dir) {
        Ok(git) => {
            tracing::debug!(workdir = %git.workdir().display(), "using git revision history");
            Arc::new(git)
        }
        Err(e) => {
            tracing::info!("{e}; commentary will not include committed diffs");
            Arc::new(NoRevisions)
        }
    }
}

/// Revision lookups for directories without version control.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRevisions;

impl RevisionSource for NoRevisions {
    fn head_content(&self, _path: &Path) -> Result<Option<String>, RevisionError> {
        Ok(None)
    }

    fn diff_against_head(&self, _path: &Path) -> Result<String, RevisionError> {
        Ok(String::new())
    }
}

/// Revision lookups backed by libgit2.
///
/// The repository is reopened for each lookup so the source stays `Sync`.
/// HEAD content is cached per path and invalidated when HEAD moves.
pub struct GitRevisions {
    workdir: PathBuf,
    head_cache: Mutex<HashMap<PathBuf, (Oid, Option<String>)>>,
}

impl GitRevisions {
    pub fn discover(dir: &Path) -> Result<Self, RevisionError> {
        let repo = Repository::discover(dir)
            .map_err(|_| RevisionError::RepositoryNotFound(dir.to_path_buf()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| RevisionError::RepositoryNotFound(dir.to_path_buf()))?;
        let workdir = workdir
            .canonicalize()
            .unwrap_or_else(|_| workdir.to_path_buf());

        Ok(Self {
            workdir,
            head_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn open(&self) -> Result<Repository, RevisionError> {
        Ok(Repository::open(&self.workdir)?)
    }

    /// Path relative to the repository root, as git expects it.
    fn repo_relative(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            return path.to_path_buf();
        }
        let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        absolute
            .strip_prefix(&self.workdir)
            .map(Path::to_path_buf)
            .unwrap_or(absolute)
    }

    fn cached(&self, rel: &Path, head: Oid) -> Option<Option<String>> {
        let cache = match self.head_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache
            .get(rel)
            .filter(|(oid, _)| *oid == head)
            .map(|(_, content)| content.clone())
    }

    fn remember(&self, rel: PathBuf, head: Oid, content: Option<String>) {
        let mut cache = match self.head_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.insert(rel, (head, content));
    }
}

impl RevisionSource for GitRevisions {
    fn head_content(&self, path: &Path) -> Result<Option<String>, RevisionError> {
        let repo = self.open()?;
        // Unborn branch: nothing is committed yet
        let Some(commit) = repo.head().ok().and_then(|head| head.peel_to_commit().ok()) else {
            return Ok(None);
        };
        let rel = self.repo_relative(path);

        if let Some(content) = self.cached(&rel, commit.id()) {
            return Ok(content);
        }

        let tree = commit.tree()?;
        let content = match tree.get_path(&rel) {
            Ok(entry) => {
                let blob = repo.find_blob(entry.id())?;
                let text = String::from_utf8(blob.content().to_vec())
                    .map_err(|_| RevisionError::NotUtf8 { path: rel.clone() })?;
                Some(text)
            }
            Err(e) if e.code() == ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        self.remember(rel, commit.id(), content.clone());
        Ok(content)
    }

    fn diff_against_head(&self, path: &Path) -> Result<String, RevisionError> {
        let repo = self.open()?;
        let head_tree = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_tree().ok());
        let rel = self.repo_relative(path);

        let mut opts = DiffOptions::new();
        opts.pathspec(rel.to_string_lossy().replace('\\', "/"))
            .disable_pathspec_match(true)
            .include_untracked(true)
            .show_untracked_content(true);

        let diff = repo.diff_tree_to_workdir(head_tree.as_ref(), Some(&mut opts))?;

        let mut buf = Vec::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                buf.push(line.origin() as u8);
            }
            buf.extend_from_slice(line.content());
            true
        })?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn setup_repo() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        dir
    }

    fn commit_file(dir: &Path, name: &str, content: &str, msg: &str) {
        let repo = Repository::open(dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@test.com").unwrap();
        if let Ok(head) = repo.head() {
            let parent = head.peel_to_commit().unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[&parent])
                .unwrap();
        } else {
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[])
                .unwrap();
        }
    }

    #[test]
    fn test_discover_outside_repo_fails() {
        let dir = tempdir().unwrap();
        // tempdirs normally live outside any repository; skip if not
        if Repository::discover(dir.path()).is_ok() {
            return;
        }
        let err = GitRevisions::discover(dir.path()).err().unwrap();
        assert!(matches!(err, RevisionError::RepositoryNotFound(_)));
    }

    #[test]
    fn test_head_content_unborn_is_none() {
        let dir = setup_repo();
        fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        let git = GitRevisions::discover(dir.path()).unwrap();
        assert_eq!(git.head_content(&dir.path().join("a.txt")).unwrap(), None);
    }

    #[test]
    fn test_head_content_returns_committed_text() {
        let dir = setup_repo();
        commit_file(dir.path(), "a.txt", "committed\n", "init");
        fs::write(dir.path().join("a.txt"), "working copy\n").unwrap();

        let git = GitRevisions::discover(dir.path()).unwrap();
        let content = git.head_content(&dir.path().join("a.txt")).unwrap();
        assert_eq!(content.as_deref(), Some("committed\n"));
    }

    #[test]
    fn test_head_content_untracked_file_is_none() {
        let dir = setup_repo();
        commit_file(dir.path(), "a.txt", "x\n", "init");
        fs::write(dir.path().join("new.rs"), "fn main() {}\n").unwrap();

        let git = GitRevisions::discover(dir.path()).unwrap();
        assert_eq!(git.head_content(&dir.path().join("new.rs")).unwrap(), None);
    }

    #[test]
    fn test_head_content_follows_new_commits() {
        let dir = setup_repo();
        commit_file(dir.path(), "a.txt", "v1\n", "one");
        let git = GitRevisions::discover(dir.path()).unwrap();
        let path = dir.path().join("a.txt");
        assert_eq!(git.head_content(&path).unwrap().as_deref(), Some("v1\n"));

        commit_file(dir.path(), "a.txt", "v2\n", "two");
        assert_eq!(git.head_content(&path).unwrap().as_deref(), Some("v2\n"));
    }

    #[test]
    fn test_diff_against_head_shows_added_line() {
        let dir = setup_repo();
        commit_file(dir.path(), "src.rs", "fn old() {}\n", "init");
        fs::write(dir.path().join("src.rs"), "fn old() {}\nfn extra() {}\n").unwrap();

        let git = GitRevisions::discover(dir.path()).unwrap();
        let diff = git.diff_against_head(&dir.path().join("src.rs")).unwrap();
        assert!(diff.contains("+fn extra() {}"));
        assert!(!diff.contains("+fn old() {}"));
    }

    #[test]
    fn test_diff_against_head_is_scoped_to_one_file() {
        let dir = setup_repo();
        commit_file(dir.path(), "a.txt", "a\n", "init");
        commit_file(dir.path(), "b.txt", "b\n", "second");
        fs::write(dir.path().join("a.txt"), "a\nmore a\n").unwrap();
        fs::write(dir.path().join("b.txt"), "b\nmore b\n").unwrap();

        let git = GitRevisions::discover(dir.path()).unwrap();
        let diff = git.diff_against_head(&dir.path().join("a.txt")).unwrap();
        assert!(diff.contains("+more a"));
        assert!(!diff.contains("more b"));
    }

    #[test]
    fn test_diff_against_head_unchanged_is_empty() {
        let dir = setup_repo();
        commit_file(dir.path(), "stable.txt", "unchanged\n", "init");
        let git = GitRevisions::discover(dir.path()).unwrap();
        let diff = git.diff_against_head(&dir.path().join("stable.txt")).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_no_revisions_is_always_empty() {
        let source = NoRevisions;
        assert_eq!(source.head_content(Path::new("/x")).unwrap(), None);
        assert_eq!(source.diff_against_head(Path::new("/x")).unwrap(), "");
    }
}
