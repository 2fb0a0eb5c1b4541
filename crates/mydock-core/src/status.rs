use mydock_runtime::ContainerStatus;
use mydock_schema::CommandName;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageFreshness {
    UpToDate,
    Outdated,
    Deleted,
}

impl ImageFreshness {
    pub fn label(self) -> &'static str {
        match self {
            Self::UpToDate => "[Up-to-date]",
            Self::Outdated => "[Outdated]",
            Self::Deleted => "[Deleted]",
        }
    }
}

/// Display form of a container status; `None` means no container.
pub fn container_label(status: Option<ContainerStatus>) -> &'static str {
    match status {
        None => "[Deleted]",
        Some(ContainerStatus::Created) => "[Created]",
        Some(ContainerStatus::Running) => "[Running]",
        Some(ContainerStatus::Paused) => "[Paused]",
        Some(ContainerStatus::Restarting) => "[Restarting]",
        Some(ContainerStatus::Removing) => "[Removing]",
        Some(ContainerStatus::Exited) => "[Exited]",
        Some(ContainerStatus::Dead) => "[Dead]",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub id: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandStatus {
    pub name: CommandName,
    /// First container found; `container_count` > 1 signals a conflict.
    pub container: Option<ContainerSummary>,
    pub container_count: usize,
    pub freshness: ImageFreshness,
    pub image: Option<ImageSummary>,
    pub executable: Option<PathBuf>,
    pub dockerfile: PathBuf,
    pub customized: bool,
    pub share: Vec<PathBuf>,
    /// `file:line` of the declaration.
    pub source: String,
}

impl CommandStatus {
    pub fn container_label(&self) -> &'static str {
        container_label(self.container.as_ref().map(|c| c.status))
    }

    pub fn has_conflict(&self) -> bool {
        self.container_count > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub config_path: PathBuf,
    pub commands: Vec<CommandStatus>,
    /// Diagnostics for entries that failed validation.
    pub rejected: Vec<String>,
}

impl StatusReport {
    /// Commands whose image is outdated.
    pub fn stale(&self) -> Vec<CommandName> {
        self.commands
            .iter()
            .filter(|c| c.freshness == ImageFreshness::Outdated)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&CommandStatus> {
        self.commands.iter().find(|c| c.name == *name)
    }
}
