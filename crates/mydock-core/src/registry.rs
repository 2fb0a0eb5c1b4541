//! Per-invocation view of every configured command.
//!
//! Engine state is fetched lazily and cached per command. The engine is shared
//! with other tools, so the caches are dropped wholesale after every mutating
//! call; there is no way to refresh a single field.

use crate::fingerprint::compute_fingerprint;
use crate::CoreError;
use indexmap::IndexMap;
use mydock_runtime::{ContainerEngine, ContainerInfo, ImageInfo, SourceTree};
use mydock_schema::{load_commands_file, CommandName, CommandSpec, EntryError, Fingerprint};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Label carrying the command name on images and containers.
pub const LABEL_NAME: &str = "mydock.name";
/// Label carrying the build-time fingerprint on images.
pub const LABEL_FINGERPRINT: &str = "mydock.fingerprint";

/// A value that is either not fetched yet or fetched, possibly as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cached<T> {
    #[default]
    NotLoaded,
    Loaded(T),
}

impl<T> Cached<T> {
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::NotLoaded => None,
            Self::Loaded(value) => Some(value),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Return the cached value, loading it first if needed.
    pub fn get_or_try_load<E>(&mut self, load: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        T: Clone,
    {
        match self {
            Self::Loaded(value) => Ok(value.clone()),
            Self::NotLoaded => {
                let value = load()?;
                *self = Self::Loaded(value.clone());
                Ok(value)
            }
        }
    }
}

struct Entry {
    spec: CommandSpec,
    image: Cached<Option<ImageInfo>>,
    containers: Cached<Vec<ContainerInfo>>,
    fingerprint: Cached<Fingerprint>,
}

impl Entry {
    fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            image: Cached::NotLoaded,
            containers: Cached::NotLoaded,
            fingerprint: Cached::NotLoaded,
        }
    }
}

/// Best-effort choice among images sharing a command label: a `latest` tag
/// wins, otherwise the first one listed.
fn pick_image(mut images: Vec<ImageInfo>) -> Option<ImageInfo> {
    match images.iter().position(ImageInfo::is_latest) {
        Some(index) => Some(images.swap_remove(index)),
        None => images.into_iter().next(),
    }
}

pub struct Registry {
    config_path: PathBuf,
    entries: IndexMap<CommandName, Entry>,
    rejected: Vec<EntryError>,
    warnings: Vec<String>,
}

impl Registry {
    /// Load the commands file at `config_path`.
    pub fn load(config_path: &Path) -> Result<Self, CoreError> {
        let mut registry = Self {
            config_path: config_path.to_path_buf(),
            entries: IndexMap::new(),
            rejected: Vec::new(),
            warnings: Vec::new(),
        };
        registry.reload()?;
        Ok(registry)
    }

    /// Re-read the commands file and drop every cached value.
    pub fn reload(&mut self) -> Result<(), CoreError> {
        let config = load_commands_file(&self.config_path)?;
        self.entries = config
            .commands
            .into_iter()
            .map(|(name, spec)| (name, Entry::new(spec)))
            .collect();
        self.rejected = config.rejected;
        self.warnings = config.warnings;
        debug!(
            "loaded {} commands from {}",
            self.entries.len(),
            self.config_path.display()
        );
        Ok(())
    }

    /// Forget cached engine state. Fingerprints survive; they depend on
    /// the source tree only.
    pub fn invalidate(&mut self) {
        for entry in self.entries.values_mut() {
            entry.image = Cached::NotLoaded;
            entry.containers = Cached::NotLoaded;
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn names(&self) -> Vec<CommandName> {
        self.entries.keys().cloned().collect()
    }

    pub fn rejected(&self) -> &[EntryError] {
        &self.rejected
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Entry, CoreError> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| CoreError::UnknownCommand(name.to_owned()))
    }

    pub fn spec(&self, name: &str) -> Result<&CommandSpec, CoreError> {
        self.entries
            .get(name)
            .map(|e| &e.spec)
            .ok_or_else(|| CoreError::UnknownCommand(name.to_owned()))
    }

    pub fn image(
        &mut self,
        name: &str,
        engine: &dyn ContainerEngine,
    ) -> Result<Option<ImageInfo>, CoreError> {
        let entry = self.entry_mut(name)?;
        entry.image.get_or_try_load(|| {
            engine
                .list_images(LABEL_NAME, name)
                .map(pick_image)
                .map_err(CoreError::from)
        })
    }

    /// Every container labelled with `name`.
    pub fn containers(
        &mut self,
        name: &str,
        engine: &dyn ContainerEngine,
    ) -> Result<Vec<ContainerInfo>, CoreError> {
        let entry = self.entry_mut(name)?;
        entry
            .containers
            .get_or_try_load(|| engine.list_containers(LABEL_NAME, name).map_err(CoreError::from))
    }

    /// The container of `name`. More than one is a conflict the operator has
    /// to resolve; nothing is picked.
    pub fn container(
        &mut self,
        name: &str,
        engine: &dyn ContainerEngine,
    ) -> Result<Option<ContainerInfo>, CoreError> {
        let mut containers = self.containers(name, engine)?;
        match containers.len() {
            0 => Ok(None),
            1 => Ok(containers.pop()),
            count => Err(CoreError::DuplicateContainers {
                name: name.to_owned(),
                count,
            }),
        }
    }

    pub fn fingerprint(
        &mut self,
        name: &str,
        tree: &dyn SourceTree,
    ) -> Result<Fingerprint, CoreError> {
        let entry = self.entry_mut(name)?;
        let spec = &entry.spec;
        entry
            .fingerprint
            .get_or_try_load(|| compute_fingerprint(spec, tree))
    }
}
