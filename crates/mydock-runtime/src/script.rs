use crate::{exit_code, RuntimeError};
use std::io::Write as _;
use std::process::Command;
use tracing::debug;

/// Run a pre/post-build script with bash, `set -e` in effect.
///
/// The child inherits the parent environment extended with `env`. An empty
/// script is a no-op.
pub fn run_script(script: &str, env: &[(String, String)]) -> Result<(), RuntimeError> {
    if script.trim().is_empty() {
        return Ok(());
    }
    let mut file = tempfile::Builder::new()
        .prefix("mydock-script")
        .suffix(".sh")
        .tempfile()?;
    write!(file, "#!/bin/bash\nset -e\n{script}\n")?;
    file.flush()?;

    debug!(
        "running build script ({} lines, env keys: {})",
        script.lines().count(),
        env.iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(",")
    );
    let status = Command::new("bash")
        .arg(file.path())
        .envs(env.iter().map(|(k, v)| (k, v)))
        .status()?;
    if !status.success() {
        return Err(RuntimeError::ScriptFailed {
            code: exit_code(status),
        });
    }
    Ok(())
}
