use crate::RuntimeError;
use mydock_schema::{ContainerId, ImageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Container status as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl ContainerStatus {
    pub const ALL: [Self; 7] = [
        Self::Created,
        Self::Running,
        Self::Paused,
        Self::Restarting,
        Self::Removing,
        Self::Exited,
        Self::Dead,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerStatus {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| RuntimeError::Parse(format!("unknown container status '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: ImageId,
    pub tags: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl ImageInfo {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn is_latest(&self) -> bool {
        self.tags.iter().any(|t| t.ends_with(":latest"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub status: ContainerStatus,
    pub labels: BTreeMap<String, String>,
}

/// A build-time secret. The value is only ever handed to the engine process.
#[derive(Clone, PartialEq, Eq)]
pub struct BuildSecret {
    pub id: String,
    pub value: String,
}

impl fmt::Debug for BuildSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildSecret")
            .field("id", &self.id)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub tag: String,
    pub labels: BTreeMap<String, String>,
    pub build_args: Vec<(String, String)>,
    pub secrets: Vec<BuildSecret>,
}

/// Host directory bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: PathBuf,
}

impl Mount {
    /// Mount a host path at the identical container path.
    pub fn same_path(path: impl AsRef<Path>) -> Self {
        Self {
            host: path.as_ref().to_path_buf(),
            container: path.as_ref().to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub image: ImageId,
    pub name: String,
    pub command: Vec<String>,
    pub mounts: Vec<Mount>,
    pub privileged: bool,
    pub labels: BTreeMap<String, String>,
    /// Extra `run` flags, already rendered (`--memory=2g`).
    pub options: Vec<String>,
}

/// The container runtime, consumed through the primitives mydock needs.
///
/// Every listing is a fresh query; implementations keep no cache because the
/// runtime is shared with other tools and may change between any two calls.
pub trait ContainerEngine: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Tagged images whose label `key` equals `value` exactly.
    fn list_images(&self, key: &str, value: &str) -> Result<Vec<ImageInfo>, RuntimeError>;

    /// All containers, running or not, whose label `key` equals `value` exactly.
    fn list_containers(&self, key: &str, value: &str) -> Result<Vec<ContainerInfo>, RuntimeError>;

    /// Build an image and return the build's exit code. Output goes to the
    /// caller's terminal.
    fn build_image(&self, request: &BuildRequest) -> Result<i32, RuntimeError>;

    /// Create and start a detached container.
    fn run_container(&self, request: &RunRequest) -> Result<ContainerId, RuntimeError>;

    fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError>;

    fn stop_container(&self, id: &ContainerId, timeout_secs: u32) -> Result<(), RuntimeError>;

    fn unpause_container(&self, id: &ContainerId) -> Result<(), RuntimeError>;

    /// Force-remove a container, running or not.
    fn remove_container(&self, id: &ContainerId) -> Result<(), RuntimeError>;

    /// Force-remove an image.
    fn remove_image(&self, id: &ImageId) -> Result<(), RuntimeError>;

    /// Copy a local file into a running container and mark it executable.
    fn install_executable(
        &self,
        id: &ContainerId,
        local: &Path,
        dest: &str,
    ) -> Result<(), RuntimeError>;

    /// Run a command in a running container attached to the caller's
    /// terminal and return its exit code.
    fn exec(
        &self,
        id: &ContainerId,
        env: &[(String, String)],
        command: &[String],
    ) -> Result<i32, RuntimeError>;
}

/// Shared handles forward to the engine they point at.
impl<T: ContainerEngine + ?Sized> ContainerEngine for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn available(&self) -> bool {
        (**self).available()
    }

    fn list_images(&self, key: &str, value: &str) -> Result<Vec<ImageInfo>, RuntimeError> {
        (**self).list_images(key, value)
    }

    fn list_containers(&self, key: &str, value: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        (**self).list_containers(key, value)
    }

    fn build_image(&self, request: &BuildRequest) -> Result<i32, RuntimeError> {
        (**self).build_image(request)
    }

    fn run_container(&self, request: &RunRequest) -> Result<ContainerId, RuntimeError> {
        (**self).run_container(request)
    }

    fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        (**self).start_container(id)
    }

    fn stop_container(&self, id: &ContainerId, timeout_secs: u32) -> Result<(), RuntimeError> {
        (**self).stop_container(id, timeout_secs)
    }

    fn unpause_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        (**self).unpause_container(id)
    }

    fn remove_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        (**self).remove_container(id)
    }

    fn remove_image(&self, id: &ImageId) -> Result<(), RuntimeError> {
        (**self).remove_image(id)
    }

    fn install_executable(
        &self,
        id: &ContainerId,
        local: &Path,
        dest: &str,
    ) -> Result<(), RuntimeError> {
        (**self).install_executable(id, local, dest)
    }

    fn exec(
        &self,
        id: &ContainerId,
        env: &[(String, String)],
        command: &[String],
    ) -> Result<i32, RuntimeError> {
        (**self).exec(id, env, command)
    }
}

pub fn select_engine(name: &str) -> Result<Box<dyn ContainerEngine>, RuntimeError> {
    match name {
        "docker" => Ok(Box::new(crate::docker::DockerEngine::new())),
        "mock" => Ok(Box::new(crate::mock::MockEngine::new())),
        other => Err(RuntimeError::EngineUnavailable(other.to_owned())),
    }
}
