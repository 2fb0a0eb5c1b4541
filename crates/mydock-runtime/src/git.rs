use crate::source::{SourceTree, SourceTreeError, TreeStatus};
use git2::{ErrorCode, Repository, Status, StatusOptions};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

/// [`SourceTree`] backed by the git repository enclosing a directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitSourceTree;

impl GitSourceTree {
    pub fn new() -> Self {
        Self
    }
}

fn vcs(err: &git2::Error) -> SourceTreeError {
    SourceTreeError::Vcs(err.message().to_owned())
}

impl SourceTree for GitSourceTree {
    fn status(&self, dir: &Path) -> Result<TreeStatus, SourceTreeError> {
        let repo = match Repository::discover(dir) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(SourceTreeError::NotARepository(dir.to_path_buf()));
            }
            Err(e) => return Err(vcs(&e)),
        };
        let root = repo
            .workdir()
            .ok_or_else(|| SourceTreeError::Vcs("repository has no working tree".to_owned()))?
            .to_path_buf();

        let commit = match repo.head() {
            Ok(head) => Some(
                head.peel_to_commit()
                    .map_err(|e| vcs(&e))?
                    .id()
                    .as_bytes()
                    .to_vec(),
            ),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(vcs(&e)),
        };

        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = repo.statuses(Some(&mut options)).map_err(|e| vcs(&e))?;

        let mut changed = BTreeSet::new();
        for entry in statuses.iter() {
            if entry.status() == Status::CURRENT || entry.status().contains(Status::IGNORED) {
                continue;
            }
            changed.insert(String::from_utf8_lossy(entry.path_bytes()).into_owned());
        }
        trace!(
            "{}: {} changed paths, commit present: {}",
            root.display(),
            changed.len(),
            commit.is_some()
        );
        Ok(TreeStatus {
            root,
            commit,
            changed,
        })
    }

    fn open(&self, root: &Path, path: &str) -> Result<Option<Box<dyn Read>>, SourceTreeError> {
        let full = root.join(path);
        match std::fs::metadata(&full) {
            Ok(meta) if meta.is_file() => Ok(Some(Box::new(File::open(full)?))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn commit_all(repo: &Repository) {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parents)
            .unwrap();
    }

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("tracked.txt"), "one").unwrap();
        std::fs::create_dir(dir.path().join("docker")).unwrap();
        std::fs::write(dir.path().join("docker/dev.Dockerfile"), "FROM alpine").unwrap();
        commit_all(&repo);
        (dir, repo)
    }

    #[test]
    fn clean_repo_reports_commit_and_no_changes() {
        let (dir, repo) = setup_repo();
        let status = GitSourceTree.status(&dir.path().join("docker")).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap().id();
        assert_eq!(status.commit.as_deref(), Some(head.as_bytes()));
        assert!(status.changed.is_empty());
        assert_eq!(
            status.root.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn modified_staged_and_untracked_paths_are_reported() {
        let (dir, repo) = setup_repo();
        std::fs::write(dir.path().join("tracked.txt"), "two").unwrap();
        std::fs::write(dir.path().join("staged.txt"), "s").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("staged.txt")).unwrap();
        index.write().unwrap();
        std::fs::create_dir(dir.path().join("new")).unwrap();
        std::fs::write(dir.path().join("new/file.txt"), "u").unwrap();

        let status = GitSourceTree.status(dir.path()).unwrap();
        let changed: Vec<&str> = status.changed.iter().map(String::as_str).collect();
        assert_eq!(changed, vec!["new/file.txt", "staged.txt", "tracked.txt"]);
    }

    #[test]
    fn deleted_file_is_changed_and_absent() {
        let (dir, _repo) = setup_repo();
        std::fs::remove_file(dir.path().join("tracked.txt")).unwrap();
        let status = GitSourceTree.status(dir.path()).unwrap();
        assert!(status.changed.contains("tracked.txt"));
        assert!(GitSourceTree
            .open(&status.root, "tracked.txt")
            .unwrap()
            .is_none());
    }

    #[test]
    fn ignored_files_are_skipped() {
        let (dir, repo) = setup_repo();
        std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        commit_all(&repo);
        std::fs::write(dir.path().join("build.log"), "noise").unwrap();
        let status = GitSourceTree.status(dir.path()).unwrap();
        assert!(status.changed.is_empty());
    }

    #[test]
    fn unborn_head_has_no_commit() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let status = GitSourceTree.status(dir.path()).unwrap();
        assert!(status.commit.is_none());
        assert!(status.changed.contains("a.txt"));
    }

    #[test]
    fn plain_directory_is_not_a_repository() {
        let dir = TempDir::new().unwrap();
        let plain: PathBuf = dir.path().join("plain");
        std::fs::create_dir(&plain).unwrap();
        let result = GitSourceTree.status(&plain);
        assert!(matches!(result, Err(SourceTreeError::NotARepository(_))));
    }

    #[test]
    fn directories_open_as_absent() {
        let (dir, _repo) = setup_repo();
        assert!(GitSourceTree.open(dir.path(), "docker").unwrap().is_none());
        let mut content = String::new();
        GitSourceTree
            .open(dir.path(), "tracked.txt")
            .unwrap()
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "one");
    }
}
