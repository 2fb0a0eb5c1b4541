//! External collaborators for mydock.
//!
//! This crate wraps everything that talks to the outside world: the
//! `ContainerEngine` trait with its docker CLI and in-memory backends, the
//! `SourceTree` trait with its git and in-memory backends, the bash runner for
//! pre/post-build scripts, host user identity for build args, PATH launcher
//! management and prerequisite checks.

pub mod docker;
pub mod engine;
pub mod git;
pub mod host;
pub mod launcher;
pub mod mock;
pub mod prereq;
pub mod script;
pub mod source;

pub use docker::DockerEngine;
pub use engine::{
    select_engine, BuildRequest, BuildSecret, ContainerEngine, ContainerInfo, ContainerStatus,
    ImageInfo, Mount, RunRequest,
};
pub use git::GitSourceTree;
pub use host::HostUser;
pub use mock::MockEngine;
pub use prereq::{check_engine_prereqs, format_missing, MissingPrereq};
pub use script::run_script;
pub use source::{MemorySourceTree, SourceTree, SourceTreeError, TreeStatus};

use std::io::Write as _;
use std::process::ExitStatus;
use thiserror::Error;

/// Shell helper injected into every container; `exec` calls go through it.
pub const ENTRYPOINT_HELPER: &str = include_str!("../assets/mydock-start.sh");

/// Where the helper lives inside the container.
pub const ENTRYPOINT_PATH: &str = "/usr/bin/mydock-start";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine '{0}' is not available on this system")]
    EngineUnavailable(String),
    #[error("'{command}' failed with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },
    #[error("unexpected engine output: {0}")]
    Parse(String),
    #[error("pre-build or post-build script failed with code {code}")]
    ScriptFailed { code: i32 },
    #[error("launcher error: {0}")]
    Launcher(String),
}

/// Exit code of a finished child process; signals map to `128 + signo`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Write the entrypoint helper to a temporary file ready for `docker cp`.
pub fn write_entrypoint_helper() -> Result<tempfile::NamedTempFile, RuntimeError> {
    let mut file = tempfile::Builder::new()
        .prefix("mydock-start")
        .tempfile()?;
    file.write_all(ENTRYPOINT_HELPER.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_changes_directory_then_execs() {
        assert!(ENTRYPOINT_HELPER.starts_with("#!"));
        assert!(ENTRYPOINT_HELPER.contains("_MYDOCK_PWD"));
        assert!(ENTRYPOINT_HELPER.contains("exec "));
    }

    #[test]
    fn helper_tempfile_has_content() {
        let file = write_entrypoint_helper().unwrap();
        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, ENTRYPOINT_HELPER);
    }

    #[test]
    fn exit_code_of_plain_exit() {
        let status = std::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .status()
            .unwrap();
        assert_eq!(exit_code(status), 7);
    }
}
