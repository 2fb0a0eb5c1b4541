//! Lifecycle and staleness reconciliation for mydock dev containers.
//!
//! This crate ties the commands file, the container engine and the source tree
//! together: the `Registry` caches what the engine reports per command, the
//! fingerprint module decides whether an image is still fresh, and the
//! `Reconciler` drives each command's image and container through build,
//! start, stop and dispose.

pub mod fingerprint;
pub mod interaction;
pub mod lifecycle;
pub mod reconciler;
pub mod registry;
pub mod settings;
pub mod status;

pub use fingerprint::{compute_fingerprint, normalize_dockerfile};
pub use interaction::{AssumeYes, Interaction, ScriptedInteraction};
pub use lifecycle::{start_action, stop_action, LifecycleState, RetryPolicy, StartAction, StopAction};
pub use reconciler::Reconciler;
pub use registry::{Cached, Registry};
pub use settings::Settings;
pub use status::{CommandStatus, ContainerSummary, ImageFreshness, ImageSummary, StatusReport};

use mydock_runtime::{ContainerStatus, RuntimeError};
use thiserror::Error;

/// Exit code for a failure that is not classified more precisely.
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_ENGINE: i32 = 3;
pub const EXIT_DUPLICATES: i32 = 4;
pub const EXIT_NOT_STARTABLE: i32 = 5;
pub const EXIT_CANCELLED: i32 = 98;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] mydock_schema::ConfigError),
    #[error("command \"{0}\" not found in the configuration")]
    UnknownCommand(String),
    #[error("{0}")]
    Runtime(#[from] RuntimeError),
    #[error(
        "too many containers ({count}) assigned to command \"{name}\"; remove the extra ones with docker rm -f, they are listed by: docker ps -a --filter label=mydock.name={name}"
    )]
    DuplicateContainers { name: String, count: usize },
    #[error("the container for \"{name}\" is {status}; it cannot be started now")]
    NotStartable {
        name: String,
        status: ContainerStatus,
    },
    #[error("the container for \"{name}\" is still restarting after {attempts} checks")]
    StuckRestarting { name: String, attempts: u32 },
    #[error("build failed with code {0}")]
    BuildFailed(i32),
    #[error("cannot get an image for command \"{0}\"")]
    MissingImage(String),
    #[error("cannot find the container for command \"{0}\"")]
    MissingContainer(String),
    #[error("interaction failed: {0}")]
    Interaction(String),
    #[error("canceled by user")]
    Cancelled,
    #[error("command exited with code {0}")]
    ExitStatus(i32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::UnknownCommand(_) => EXIT_CONFIG,
            Self::Runtime(RuntimeError::ScriptFailed { code }) => *code,
            Self::Runtime(_) | Self::MissingImage(_) | Self::MissingContainer(_) => EXIT_ENGINE,
            Self::DuplicateContainers { .. } => EXIT_DUPLICATES,
            Self::NotStartable { .. } | Self::StuckRestarting { .. } => EXIT_NOT_STARTABLE,
            Self::BuildFailed(code) | Self::ExitStatus(code) => *code,
            Self::Cancelled => EXIT_CANCELLED,
            Self::Interaction(_) | Self::Io(_) => EXIT_FAILURE,
        }
    }

    /// Failures that must not be reported as errors: an in-container command's
    /// own exit status and a declined confirmation.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::ExitStatus(_) | Self::Cancelled)
    }
}
