use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceTreeError {
    #[error("'{}' is not inside a version-controlled tree", .0.display())]
    NotARepository(PathBuf),
    #[error("version control error: {0}")]
    Vcs(String),
    #[error("source tree I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What version control knows about the tree holding a Dockerfile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStatus {
    /// Working tree root; changed paths are relative to it.
    pub root: PathBuf,
    /// Raw identity of the checked-out commit, `None` before the first commit.
    pub commit: Option<Vec<u8>>,
    /// Paths that differ from the commit in the index or working tree, plus
    /// untracked paths.
    pub changed: BTreeSet<String>,
}

/// Version-control view of the tree a command is built from.
pub trait SourceTree: Send + Sync {
    /// Status of the repository containing `dir`.
    fn status(&self, dir: &Path) -> Result<TreeStatus, SourceTreeError>;

    /// Open `path` (relative to `root`) for reading. `None` means the path is
    /// absent or not a regular file.
    fn open(&self, root: &Path, path: &str) -> Result<Option<Box<dyn Read>>, SourceTreeError>;
}

impl<T: SourceTree + ?Sized> SourceTree for std::sync::Arc<T> {
    fn status(&self, dir: &Path) -> Result<TreeStatus, SourceTreeError> {
        (**self).status(dir)
    }

    fn open(&self, root: &Path, path: &str) -> Result<Option<Box<dyn Read>>, SourceTreeError> {
        (**self).open(root, path)
    }
}

enum Mode {
    Repository,
    NotARepository,
    Failing(String),
}

struct MemoryState {
    mode: Mode,
    commit: Option<Vec<u8>>,
    changed: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

/// In-memory [`SourceTree`] with a mutable commit, changed set and file contents.
pub struct MemorySourceTree {
    root: PathBuf,
    state: Mutex<MemoryState>,
}

impl MemorySourceTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(MemoryState {
                mode: Mode::Repository,
                commit: Some(vec![0; 20]),
                changed: BTreeSet::new(),
                files: BTreeMap::new(),
            }),
        }
    }

    /// A tree that reports every directory as unversioned.
    pub fn not_a_repository() -> Self {
        let tree = Self::new("/");
        tree.lock().mode = Mode::NotARepository;
        tree
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_commit(&self, commit: Option<&[u8]>) {
        self.lock().commit = commit.map(<[u8]>::to_vec);
    }

    /// Mark `path` changed with the given content.
    pub fn write(&self, path: &str, content: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        state.changed.insert(path.to_owned());
        state.files.insert(path.to_owned(), content.into());
    }

    /// Mark `path` changed and absent, like a deleted tracked file.
    pub fn delete(&self, path: &str) {
        let mut state = self.lock();
        state.changed.insert(path.to_owned());
        state.files.remove(path);
    }

    /// Forget every change, like a commit of the whole tree.
    pub fn clean(&self) {
        let mut state = self.lock();
        state.changed.clear();
        state.files.clear();
    }

    /// Make `status` fail with a non-repository error of its own.
    pub fn fail_with(&self, message: &str) {
        self.lock().mode = Mode::Failing(message.to_owned());
    }
}

impl SourceTree for MemorySourceTree {
    fn status(&self, dir: &Path) -> Result<TreeStatus, SourceTreeError> {
        let state = self.lock();
        match &state.mode {
            Mode::NotARepository => Err(SourceTreeError::NotARepository(dir.to_path_buf())),
            Mode::Failing(message) => Err(SourceTreeError::Vcs(message.clone())),
            Mode::Repository => Ok(TreeStatus {
                root: self.root.clone(),
                commit: state.commit.clone(),
                changed: state.changed.clone(),
            }),
        }
    }

    fn open(&self, _root: &Path, path: &str) -> Result<Option<Box<dyn Read>>, SourceTreeError> {
        Ok(self
            .lock()
            .files
            .get(path)
            .map(|bytes| Box::new(std::io::Cursor::new(bytes.clone())) as Box<dyn Read>))
    }
}
